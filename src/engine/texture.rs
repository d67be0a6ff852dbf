/// Image resource handed to the rendering engine. The bytes are opaque to
/// the runtime; decoding is the engine's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub source: String,
    pub byte_len: usize,
}

impl Texture {
    pub fn new(source: impl Into<String>, byte_len: usize) -> Self {
        Self {
            source: source.into(),
            byte_len,
        }
    }
}

/// Six face textures forming a cube map, in `px nx py ny pz nz` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeTexture {
    pub name: String,
    pub faces: Vec<Texture>,
}

impl CubeTexture {
    pub const FACES: [&'static str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];
}

/// Pre-filtered environment map produced by the renderer from a source
/// texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentMap {
    pub source: String,
    pub resolution: u32,
}
