//! One-shot character cursor shared by the template parser and the URI
//! component splitter. Positions are byte offsets into the input; the
//! cursor starts before the first character and only ever moves forward,
//! except through `set_pos`.

use crate::error::Error;

#[derive(Debug)]
pub struct Cursor<'a> {
    input: &'a str,
    pos: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor { input, pos: None }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    fn here(&self) -> Option<(usize, char)> {
        let p = self.pos?;
        self.input[p..].chars().next().map(|c| (p, c))
    }

    // offset of the character following the current one
    fn ahead(&self) -> usize {
        match self.here() {
            Some((p, c)) => p + c.len_utf8(),
            None => 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.ahead() < self.input.len()
    }

    /// Advances onto the next character and returns it.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<char, Error> {
        let off = self.ahead();
        match self.input[off..].chars().next() {
            Some(c) => {
                self.pos = Some(off);
                Ok(c)
            }
            None => Err(Error::EndOfInput(self.input.to_string())),
        }
    }

    /// The next character, without advancing.
    pub fn peek(&self) -> Result<char, Error> {
        self.input[self.ahead()..]
            .chars()
            .next()
            .ok_or_else(|| Error::EndOfInput(self.input.to_string()))
    }

    /// Byte offset of the current character, None before the first `next`.
    pub fn pos(&self) -> Option<usize> {
        self.pos
    }

    /// Moves the cursor onto the character starting at byte offset `n`.
    pub fn set_pos(&mut self, n: usize) -> Result<(), Error> {
        if n >= self.input.len() || !self.input.is_char_boundary(n) {
            return Err(Error::OutOfBounds(n, self.input.to_string()));
        }
        self.pos = Some(n);
        Ok(())
    }

    /// The character at the current position.
    pub fn current(&self) -> Result<char, Error> {
        match self.here() {
            Some((_, c)) => Ok(c),
            None => Err(Error::NotStarted(self.input.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn walk() {
        let mut ci = Cursor::new("ab");
        assert!(ci.has_next());
        assert_eq!(ci.pos(), None);
        assert_eq!(ci.next().unwrap(), 'a');
        assert_eq!(ci.pos(), Some(0));
        assert_eq!(ci.current().unwrap(), 'a');
        assert_eq!(ci.peek().unwrap(), 'b');
        // peek must not advance
        assert_eq!(ci.current().unwrap(), 'a');
        assert_eq!(ci.next().unwrap(), 'b');
        assert!(!ci.has_next());
        assert!(matches!(ci.next(), Err(Error::EndOfInput(_))));
        assert!(matches!(ci.peek(), Err(Error::EndOfInput(_))));
        // exhaustion leaves the cursor on the last character
        assert_eq!(ci.current().unwrap(), 'b');
    }

    #[test]
    fn empty_input() {
        let mut ci = Cursor::new("");
        assert!(!ci.has_next());
        assert!(matches!(ci.next(), Err(Error::EndOfInput(_))));
        assert!(matches!(ci.current(), Err(Error::NotStarted(_))));
        assert!(matches!(ci.set_pos(0), Err(Error::OutOfBounds(..))));
    }

    #[test]
    fn current_before_first_advance() {
        let ci = Cursor::new("xyz");
        assert!(matches!(ci.current(), Err(Error::NotStarted(_))));
        assert!(matches!(ci.peek(), Ok('x')));
    }

    #[test]
    fn repositioning() {
        let mut ci = Cursor::new("abc");
        ci.next().unwrap();
        ci.next().unwrap();
        ci.set_pos(0).unwrap();
        assert_eq!(ci.current().unwrap(), 'a');
        assert_eq!(ci.next().unwrap(), 'b');
        assert!(matches!(ci.set_pos(3), Err(Error::OutOfBounds(..))));
        ci.set_pos(2).unwrap();
        assert_eq!(ci.current().unwrap(), 'c');
        assert!(!ci.has_next());
    }

    #[test]
    fn multibyte_positions() {
        let mut ci = Cursor::new("né/t");
        assert_eq!(ci.next().unwrap(), 'n');
        assert_eq!(ci.next().unwrap(), 'é');
        assert_eq!(ci.pos(), Some(1));
        assert_eq!(ci.next().unwrap(), '/');
        // é is two bytes wide
        assert_eq!(ci.pos(), Some(3));
        assert!(matches!(ci.set_pos(2), Err(Error::OutOfBounds(..))));
        assert_eq!(ci.next().unwrap(), 't');
        assert!(!ci.has_next());
    }
}
