mod check;
mod plot;
mod reduce;

pub use check::*;
pub use plot::*;
pub use reduce::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}
