use std::fmt;

/// Punctuation allowed in nicknames besides letters and digits
pub const NICKNAME_PUNCTUATION: &str = "_-@.#$%&*+=";

/// Longest nickname accepted, in characters
pub const NICKNAME_MAX_CHARS: usize = 32;

/// Why a nickname was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicknameError {
    Empty,
    SurroundingWhitespace,
    InnerWhitespace,
    TooLong,
    ForbiddenChar(char),
}

impl fmt::Display for NicknameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NicknameError::Empty => write!(f, "Nickname cannot be empty"),
            NicknameError::SurroundingWhitespace => {
                write!(f, "Nickname must not start or end with spaces")
            }
            NicknameError::InnerWhitespace => write!(f, "Nickname must not contain spaces"),
            NicknameError::TooLong => write!(
                f,
                "Nickname must be at most {} characters long",
                NICKNAME_MAX_CHARS
            ),
            NicknameError::ForbiddenChar(c) => write!(
                f,
                "Nickname may only contain letters, digits and {} (found '{}')",
                NICKNAME_PUNCTUATION, c
            ),
        }
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
        || NICKNAME_PUNCTUATION.contains(c)
}

/// Check a nickname against the display rules. Uniqueness is checked elsewhere.
pub fn validate_nickname(nickname: &str) -> Result<(), NicknameError> {
    if nickname.is_empty() {
        return Err(NicknameError::Empty);
    }
    if nickname.trim() != nickname {
        return Err(NicknameError::SurroundingWhitespace);
    }
    if nickname.chars().any(char::is_whitespace) {
        return Err(NicknameError::InnerWhitespace);
    }
    if nickname.chars().count() > NICKNAME_MAX_CHARS {
        return Err(NicknameError::TooLong);
    }
    if let Some(c) = nickname.chars().find(|c| !is_allowed_char(*c)) {
        return Err(NicknameError::ForbiddenChar(c));
    }
    Ok(())
}

/// Free-text answers that mean "leave the optional field empty"
pub fn is_skip_answer(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == "-" || text.eq_ignore_ascii_case("skip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nicknames() {
        for nickname in ["nik1", "Ivan_99", "Гагарин", "ёжик-2", "a.b#c$d%e&f*g+h=i@j"] {
            assert_eq!(validate_nickname(nickname), Ok(()), "{}", nickname);
        }
    }

    #[test]
    fn test_rejected_nicknames() {
        assert_eq!(validate_nickname(""), Err(NicknameError::Empty));
        assert_eq!(
            validate_nickname(" nik"),
            Err(NicknameError::SurroundingWhitespace)
        );
        assert_eq!(
            validate_nickname("nik "),
            Err(NicknameError::SurroundingWhitespace)
        );
        assert_eq!(validate_nickname("ni k"), Err(NicknameError::InnerWhitespace));
        assert_eq!(validate_nickname("ni\tk"), Err(NicknameError::InnerWhitespace));
        assert_eq!(
            validate_nickname("nik!"),
            Err(NicknameError::ForbiddenChar('!'))
        );
        assert_eq!(
            validate_nickname("ñandu"),
            Err(NicknameError::ForbiddenChar('ñ'))
        );
        assert_eq!(
            validate_nickname(&"x".repeat(NICKNAME_MAX_CHARS + 1)),
            Err(NicknameError::TooLong)
        );
    }

    #[test]
    fn test_skip_answers() {
        assert!(is_skip_answer("-"));
        assert!(is_skip_answer("SKIP"));
        assert!(is_skip_answer("  "));
        assert!(!is_skip_answer("+7 900 000"));
    }
}
