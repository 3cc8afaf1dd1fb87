//! # Terminal Device

/// Character terminal
pub trait TerminalDevice: Send + Sync {
    /// Write raw bytes to the terminal
    fn write(&self, bytes: &[u8]);

    /// Read the character that raised the terminal interrupt
    fn read_char(&self) -> u8;
}
