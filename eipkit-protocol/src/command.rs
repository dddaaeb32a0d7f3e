//! Encapsulation command and status codes.

use std::fmt;

/// An encapsulation command word.
///
/// Kept as a transparent wrapper so unrecognised commands survive a
/// decode/respond round trip (the target echoes the command word with a
/// non-zero status instead of dropping the frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncapCommand(pub u16);

impl EncapCommand {
    pub const NOP: Self = Self(0x0000);
    pub const LIST_SERVICES: Self = Self(0x0004);
    pub const LIST_IDENTITY: Self = Self(0x0063);
    pub const LIST_INTERFACES: Self = Self(0x0064);
    pub const REGISTER_SESSION: Self = Self(0x0065);
    pub const UNREGISTER_SESSION: Self = Self(0x0066);
    pub const SEND_RR_DATA: Self = Self(0x006F);
    pub const SEND_UNIT_DATA: Self = Self(0x0070);
    pub const INDICATE_STATUS: Self = Self(0x0072);
    pub const CANCEL: Self = Self(0x0073);

    pub fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            0x0000 => "Nop",
            0x0004 => "ListServices",
            0x0063 => "ListIdentity",
            0x0064 => "ListInterfaces",
            0x0065 => "RegisterSession",
            0x0066 => "UnregisterSession",
            0x006F => "SendRRData",
            0x0070 => "SendUnitData",
            0x0072 => "IndicateStatus",
            0x0073 => "Cancel",
            _ => return None,
        })
    }
}

impl fmt::Display for EncapCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "UnknownCommand({:#06X})", self.0),
        }
    }
}

/// Encapsulation status codes carried in the header `status` field.
pub mod status {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const INVALID_COMMAND: u32 = 0x0000_0001;
    pub const INSUFFICIENT_MEMORY: u32 = 0x0000_0002;
    pub const INCORRECT_DATA: u32 = 0x0000_0003;
    pub const INVALID_SESSION_HANDLE: u32 = 0x0000_0064;
    pub const INVALID_LENGTH: u32 = 0x0000_0065;
    pub const UNSUPPORTED_PROTOCOL: u32 = 0x0000_0069;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_command_names() {
        assert_eq!(EncapCommand::REGISTER_SESSION.to_string(), "RegisterSession");
        assert_eq!(EncapCommand::SEND_RR_DATA.to_string(), "SendRRData");
        assert_eq!(EncapCommand::LIST_IDENTITY.to_string(), "ListIdentity");
    }

    #[test]
    fn test_unknown_command_display() {
        let cmd = EncapCommand(0x00FF);
        assert!(cmd.name().is_none());
        assert_eq!(cmd.to_string(), "UnknownCommand(0x00FF)");
    }

    #[test]
    fn test_command_values() {
        assert_eq!(EncapCommand::REGISTER_SESSION.0, 0x0065);
        assert_eq!(EncapCommand::UNREGISTER_SESSION.0, 0x0066);
        assert_eq!(EncapCommand::SEND_RR_DATA.0, 0x006F);
        assert_eq!(EncapCommand::SEND_UNIT_DATA.0, 0x0070);
    }
}
