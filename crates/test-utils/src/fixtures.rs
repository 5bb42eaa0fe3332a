//! Common test fixtures for tile cache tests.

/// Minimal bytes that look like a PNG to anything sniffing the signature.
pub const FAKE_PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
    b'R',
];

/// A distinct payload per tile so tests can tell responses apart.
pub fn tile_payload(z: u32, x: u32, y: u32) -> Vec<u8> {
    let mut bytes = FAKE_PNG.to_vec();
    bytes.extend_from_slice(format!("{}/{}/{}", z, x, y).as_bytes());
    bytes
}

/// Well-known tiles, as (z, x, y).
pub mod tiles {
    /// London at zoom 6
    pub const LONDON_Z6: (u32, u32, u32) = (6, 31, 21);

    /// Paris at zoom 6
    pub const PARIS_Z6: (u32, u32, u32) = (6, 32, 22);
}

/// Common points as (lat, lng).
pub mod points {
    pub const LONDON: (f64, f64) = (51.5, -0.1);
    pub const PARIS: (f64, f64) = (48.85, 2.35);
}

/// Viewport extents as (west, south, east, north).
pub mod viewports {
    /// London and Paris in one view at roughly zoom 6
    pub const CHANNEL: (f64, f64, f64, f64) = (-4.0, 46.0, 6.0, 54.0);

    /// Crosses antimeridian (Pacific-centric)
    pub const PACIFIC: (f64, f64, f64, f64) = (160.0, -50.0, -140.0, 50.0);
}
