use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Engine;

/// Remove `key`. Deleting a key that does not exist is reported as `NotFound`.
#[derive(Debug, PartialEq)]
pub struct Del {
    pub key: String,
}

impl Executable for Del {
    fn exec(self, engine: &dyn Engine) -> Result<Frame, CommandError> {
        engine.delete(&self.key)?;
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.finish()?;

        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::commands::Command;
    use crate::store::Store;

    #[test]
    fn present_key() {
        let store = Store::new();
        store.set(String::from("foo"), String::from("bar")).unwrap();

        let cmd = Command::try_from(&codec::parse("DEL foo").unwrap()).unwrap();
        assert_eq!(
            cmd,
            Command::Del(Del {
                key: String::from("foo")
            })
        );

        assert_eq!(cmd.exec(&store), Ok(Frame::ok()));
        assert_eq!(
            store.get("foo"),
            Err(crate::store::StoreError::NotFound(String::from("foo")))
        );
    }

    #[test]
    fn absent_key() {
        let store = Store::new();

        let cmd = Command::try_from(&codec::parse("DEL foo").unwrap()).unwrap();

        assert_eq!(
            cmd.exec(&store),
            Err(CommandError::NotFound {
                key: String::from("foo")
            })
        );
    }

    #[test]
    fn zero_keys() {
        let request = codec::Command::new("DEL", vec![]);
        let err = Command::try_from(&request).unwrap_err();

        assert_eq!(err, CommandError::EndOfStream);
    }
}
