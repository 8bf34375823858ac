use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Engine;

/// Set `key` to hold the string `value`, overwriting any previous value.
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: String,
}

impl Executable for Set {
    fn exec(self, engine: &dyn Engine) -> Result<Frame, CommandError> {
        engine.set(self.key, self.value)?;
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_string()?;
        parser.finish()?;

        Ok(Self { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::commands::Command;
    use crate::store::Store;

    #[test]
    fn set_and_overwrite() {
        let store = Store::new();

        let cmd = Command::try_from(&codec::parse("SET key1 1").unwrap()).unwrap();
        assert_eq!(
            cmd,
            Command::Set(Set {
                key: String::from("key1"),
                value: String::from("1")
            })
        );
        assert_eq!(cmd.exec(&store), Ok(Frame::ok()));

        let cmd = Command::try_from(&codec::parse("SET key1 2").unwrap()).unwrap();
        assert_eq!(cmd.exec(&store), Ok(Frame::ok()));

        assert_eq!(store.get("key1"), Ok(String::from("2")));
    }
}
