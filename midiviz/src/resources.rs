use rust_embed::Embed;

#[derive(Embed)]
#[folder = "resources"]
struct Asset;

const RECTS_SHADER: &str = "shaders/rects.wgsl";

/// Assets compiled into the binary.
#[derive(Clone, Debug)]
pub struct Resources {
    pub rects_shader: String,
}

impl Resources {
    pub fn load() -> Result<Self, String> {
        Ok(Self {
            rects_shader: text(RECTS_SHADER)?,
        })
    }
}

fn text(path: &str) -> Result<String, String> {
    let asset =
        Asset::get(path).ok_or_else(|| format!("asset not found: {}", path))?;

    String::from_utf8(asset.data.into_owned())
        .map_err(|err| format!("asset '{}' is not UTF-8: {}", path, err))
}
