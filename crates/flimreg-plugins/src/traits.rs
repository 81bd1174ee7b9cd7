use flimreg_common::CommandId;

use crate::manifest::{ReaderContribution, SampleDataContribution, WidgetContribution};

/// A contribution that dispatches through a declared command.
pub trait CommandBinding {
    /// Contribution kind, used in error messages.
    const KIND: &'static str;

    /// Id of the command this contribution invokes.
    fn command(&self) -> &CommandId;
}

impl CommandBinding for ReaderContribution {
    const KIND: &'static str = "reader";

    fn command(&self) -> &CommandId {
        &self.command
    }
}

impl CommandBinding for SampleDataContribution {
    const KIND: &'static str = "sample data";

    fn command(&self) -> &CommandId {
        &self.command
    }
}

impl CommandBinding for WidgetContribution {
    const KIND: &'static str = "widget";

    fn command(&self) -> &CommandId {
        &self.command
    }
}
