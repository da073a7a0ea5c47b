//! Controller event kinds
//!
//! The coexisting stack's event dispatcher hands these to the flash core.

/// Event reported by the controller's event dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerEvent {
    /// The outstanding flash operation finished
    FlashOperationSuccess,
    /// The outstanding flash operation was attempted and failed
    FlashOperationError,
    /// Any other event kind (raw id), not related to flash
    Other(u32),
}

impl ControllerEvent {
    /// Check if this event ends an outstanding flash operation
    pub fn is_flash_completion(self) -> bool {
        matches!(
            self,
            ControllerEvent::FlashOperationSuccess | ControllerEvent::FlashOperationError
        )
    }
}
