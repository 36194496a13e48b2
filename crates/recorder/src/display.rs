use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Open,
    /// The operator closed the preview window or pressed the cancel key.
    Closed,
}

/// Preview display collaborator. Receives one composed side-by-side frame
/// per tick and reports whether the operator asked to stop.
pub trait Display: Send {
    fn present(&mut self, frame: &Frame) -> DisplayStatus;
}

/// No-op display for headless deployments.
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn present(&mut self, _frame: &Frame) -> DisplayStatus {
        DisplayStatus::Open
    }
}
