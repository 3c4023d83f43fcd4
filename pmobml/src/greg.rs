//! Greg registers: session-scoped string registers of the document engine.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct GregRegisters {
    registers: HashMap<u32, String>,
}

impl GregRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unset registers read as an empty string.
    pub fn get(&self, index: u32) -> &str {
        self.registers.get(&index).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, index: u32, value: String) {
        self.registers.insert(index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_register_is_empty() {
        let registers = GregRegisters::new();
        assert_eq!(registers.get(0), "");
    }

    #[test]
    fn test_set_overwrites() {
        let mut registers = GregRegisters::new();
        registers.set(3, "first".to_string());
        registers.set(3, "second".to_string());
        assert_eq!(registers.get(3), "second");
        assert_eq!(registers.get(4), "");
    }
}
