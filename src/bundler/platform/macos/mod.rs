//! macOS packaging: a signed, notarized and stapled DMG.
//!
//! # Build Requirements
//!
//! | Step | Required Tools | Notes |
//! |------|----------------|-------|
//! | Qt deployment | `macdeployqt` | From `--qtdir` or the `qmake` on `PATH` |
//! | Universal builds | `makeuniversal` | Cloned and built in `tools/` |
//! | Code signing | `codesign`, Developer ID certificate | `--cert` |
//! | Notarization | `xcrun altool`, `xcrun stapler` | `--appleid`, `--password` |
//! | Disk image | `tiffutil`, `create-dmg` | `create-dmg` is cloned in `tools/` |
//!
//! # Output Location
//!
//! - `deployment/Pingnoo [2021.03.15-R3] (x86_64).dmg`

pub mod dmg;
pub mod notarize;
pub mod sign;
pub mod universal;
