//! Option flags controlling matching behavior.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bit-set of matching options.
///
/// Covers the usual regex switches plus the continuation flags the search
/// driver sets between attempts (`NOT_BEGIN_OF_LINE`/`NOT_END_OF_LINE`).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionFlags(u32);

impl OptionFlags {
    pub const NONE: OptionFlags = OptionFlags(0);
    /// Case-insensitive matching.
    pub const INSENSITIVE: OptionFlags = OptionFlags(1 << 0);
    /// Keep scanning for further matches after one is found.
    pub const GLOBAL: OptionFlags = OptionFlags(1 << 1);
    /// `^` and `$` also match around line terminators.
    pub const MULTILINE: OptionFlags = OptionFlags(1 << 2);
    /// Match only at the starting offset.
    pub const STICKY: OptionFlags = OptionFlags(1 << 3);
    /// Logical positions count code points and surrogate pairs decode.
    pub const UNICODE: OptionFlags = OptionFlags(1 << 4);
    /// `.` also matches line terminators.
    pub const SINGLE_LINE: OptionFlags = OptionFlags(1 << 5);
    /// Stop after the first reported match.
    pub const SINGLE_MATCH: OptionFlags = OptionFlags(1 << 6);
    /// Let `^`/`$` and `.` inspect line terminators explicitly.
    pub const CONSIDER_NEWLINE: OptionFlags = OptionFlags(1 << 7);
    /// Reject matches positioned at the beginning of a line.
    pub const NOT_BEGIN_OF_LINE: OptionFlags = OptionFlags(1 << 8);
    /// Reject matches positioned at the end of a line.
    pub const NOT_END_OF_LINE: OptionFlags = OptionFlags(1 << 9);

    #[inline]
    pub fn contains(self, other: OptionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: OptionFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: OptionFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: OptionFlags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl BitOr for OptionFlags {
    type Output = OptionFlags;

    fn bitor(self, rhs: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OptionFlags {
    fn bitor_assign(&mut self, rhs: OptionFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OptionFlags {
    type Output = OptionFlags;

    fn bitand(self, rhs: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 & rhs.0)
    }
}

impl fmt::Debug for OptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OptionFlags, &str); 10] = [
            (OptionFlags::INSENSITIVE, "INSENSITIVE"),
            (OptionFlags::GLOBAL, "GLOBAL"),
            (OptionFlags::MULTILINE, "MULTILINE"),
            (OptionFlags::STICKY, "STICKY"),
            (OptionFlags::UNICODE, "UNICODE"),
            (OptionFlags::SINGLE_LINE, "SINGLE_LINE"),
            (OptionFlags::SINGLE_MATCH, "SINGLE_MATCH"),
            (OptionFlags::CONSIDER_NEWLINE, "CONSIDER_NEWLINE"),
            (OptionFlags::NOT_BEGIN_OF_LINE, "NOT_BEGIN_OF_LINE"),
            (OptionFlags::NOT_END_OF_LINE, "NOT_END_OF_LINE"),
        ];

        if self.0 == 0 {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_intersects() {
        let flags = OptionFlags::GLOBAL | OptionFlags::UNICODE;
        assert!(flags.contains(OptionFlags::GLOBAL));
        assert!(flags.contains(OptionFlags::GLOBAL | OptionFlags::UNICODE));
        assert!(!flags.contains(OptionFlags::STICKY));
        assert!(flags.intersects(OptionFlags::UNICODE | OptionFlags::STICKY));
        assert!(!flags.intersects(OptionFlags::STICKY));
    }

    #[test]
    fn insert_and_remove() {
        let mut flags = OptionFlags::NONE;
        flags.insert(OptionFlags::MULTILINE);
        assert!(flags.contains(OptionFlags::MULTILINE));
        flags.remove(OptionFlags::MULTILINE);
        assert_eq!(flags, OptionFlags::NONE);
    }

    #[test]
    fn debug_lists_set_flags() {
        let flags = OptionFlags::INSENSITIVE | OptionFlags::STICKY;
        assert_eq!(format!("{flags:?}"), "INSENSITIVE|STICKY");
        assert_eq!(format!("{:?}", OptionFlags::NONE), "NONE");
    }
}
