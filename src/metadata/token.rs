use std::fmt;
use std::hash::{Hash, Hasher};

use strum::{Display, EnumIter};

/// The metadata table a [`Token`] points into.
///
/// Only the tables the runtime context hands out rows for are named; every other
/// table byte maps to [`TokenTable::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TokenTable {
    /// Type definitions (classes, value types and delegate types)
    TypeDef,
    /// Field definitions
    Field,
    /// Method definitions
    MethodDef,
    /// Any table this crate does not allocate rows in
    Other,
}

/// A metadata token identifying a type, field or method.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table
/// - The low 24 bits (bits 0-23) indicate the row within that table
///
/// The [`TypeRegistry`](crate::metadata::registry::TypeRegistry) allocates
/// rows sequentially, so tokens of the same table order by registration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Table byte of type definitions
    pub const TYPE_DEF: u8 = 0x02;
    /// Table byte of field definitions
    pub const FIELD: u8 = 0x04;
    /// Table byte of method definitions
    pub const METHOD_DEF: u8 = 0x06;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for the given row of `table`
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a type definition token
    #[must_use]
    pub fn type_def(row: u32) -> Self {
        Self::from_parts(Self::TYPE_DEF, row)
    }

    /// Creates a method definition token
    #[must_use]
    pub fn method_def(row: u32) -> Self {
        Self::from_parts(Self::METHOD_DEF, row)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table byte from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Classifies the table byte
    #[must_use]
    pub fn kind(&self) -> TokenTable {
        match self.table() {
            Self::TYPE_DEF => TokenTable::TypeDef,
            Self::FIELD => TokenTable::Field,
            Self::METHOD_DEF => TokenTable::MethodDef,
            _ => TokenTable::Other,
        }
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: {}, row: {})",
            self.0,
            self.kind(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_parts() {
        let token = Token::from_parts(Token::METHOD_DEF, 7);
        assert_eq!(token.value(), 0x0600_0007);
        assert_eq!(token, Token::method_def(7));
    }

    #[test]
    fn test_token_row_is_masked() {
        let token = Token::type_def(0x0100_0002);
        assert_eq!(token.table(), Token::TYPE_DEF);
        assert_eq!(token.row(), 2);
    }

    #[test]
    fn test_token_kind() {
        assert_eq!(Token::type_def(1).kind(), TokenTable::TypeDef);
        assert_eq!(Token::method_def(1).kind(), TokenTable::MethodDef);
        assert_eq!(Token::from_parts(Token::FIELD, 1).kind(), TokenTable::Field);
        assert_eq!(Token::new(0x1B00_0001).kind(), TokenTable::Other);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token::new(0).is_null());
        assert!(!Token::type_def(1).is_null());
    }

    #[test]
    fn test_token_formatting() {
        let token = Token::method_def(0x2A);
        assert_eq!(format!("{}", token), "0x0600002a");
        assert_eq!(
            format!("{:?}", token),
            "Token(0x0600002a, table: MethodDef, row: 42)"
        );
    }

    #[test]
    fn test_token_ordering_follows_rows() {
        let mut tokens = vec![Token::type_def(3), Token::type_def(1), Token::type_def(2)];
        tokens.sort();
        let rows: Vec<u32> = tokens.iter().map(Token::row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }
}
