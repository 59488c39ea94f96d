/// Data layer: record codec, core types, grouping, and band transforms.
///
/// Architecture:
/// ```text
///  raw instrument records (.ref / dual-channel)
///        │
///        ▼
///   ┌──────────┐
///   │  record   │  decode bytes → Header + SpectralCurve
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  group    │  sorted directory listing → ReplicateGroups
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ transform │  optional band blanking (water absorption)
///   └──────────┘
/// ```
pub mod group;
pub mod model;
pub mod record;
pub mod transform;
