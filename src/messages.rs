use crate::beacon::SourceToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Started,
    Stopped,
    DeviceLinked(SourceToken),
    DeviceUnlinked(SourceToken),
}

/// What the radio should do in response to a [`ScanEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanCommand {
    Start,
    Restart,
    Stop,
    None,
}
