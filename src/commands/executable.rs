use crate::commands::CommandError;
use crate::frame::Frame;
use crate::store::Engine;

pub trait Executable {
    fn exec(self, engine: &dyn Engine) -> Result<Frame, CommandError>;
}
