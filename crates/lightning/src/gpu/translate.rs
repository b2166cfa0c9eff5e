//! Rewrites WebGL (GLSL ES 1.00) stages into Vulkan-flavoured GLSL 450.
//!
//! Steps performed per stage:
//!
//! 1. Drop `#version` and `precision` statements.
//! 2. Collect loose `uniform` declarations into one std140 block at
//!    `set = 0, binding = 0` and alias each name back with a `#define`.
//! 3. Give `attribute`/`varying` declarations explicit locations.
//! 4. Fragment only: route `gl_FragColor` to a location-0 output and remap
//!    `gl_FragCoord` to a bottom-left origin before calling the renamed `main`.
//!
//! Stripped lines are kept as blank lines and the body starts at `#line 1`, so
//! diagnostics point at the line numbers of the untranslated source.

use crate::types::ShaderStage;

const BLOCK_INSTANCE: &str = "lightning_uniforms";
const MEMBER_PREFIX: &str = "lightning_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    fn parse(ty: &str) -> Option<Self> {
        match ty {
            "float" => Some(Self::Float),
            "vec2" => Some(Self::Vec2),
            "vec3" => Some(Self::Vec3),
            "vec4" => Some(Self::Vec4),
            _ => None,
        }
    }

    fn glsl(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
        }
    }

    pub(crate) fn components(self) -> u32 {
        match self {
            Self::Float => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }

    /// std140 base alignment, in floats.
    fn alignment(self) -> u32 {
        match self {
            Self::Float => 1,
            Self::Vec2 => 2,
            Self::Vec3 | Self::Vec4 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    /// Offset into the block, in floats.
    pub offset: u32,
}

/// std140 layout of the generated uniform block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UniformBlock {
    fields: Vec<UniformField>,
    /// End of the last member, in floats.
    end: u32,
}

impl UniformBlock {
    fn push(&mut self, name: &str, kind: UniformKind) -> Result<(), String> {
        if self.field(name).is_some() {
            return Err(format!("uniform '{name}' redeclared"));
        }
        let align = kind.alignment();
        let offset = self.end.div_ceil(align) * align;
        self.end = offset + kind.components();
        self.fields.push(UniformField {
            name: name.to_string(),
            kind,
            offset,
        });
        Ok(())
    }

    pub(crate) fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Block size in floats, rounded up to a whole vec4.
    pub(crate) fn padded_len(&self) -> usize {
        (self.end.div_ceil(4) * 4).max(4) as usize
    }

    fn declaration(&self) -> String {
        let mut out = String::from("layout(std140, set = 0, binding = 0) uniform LightningUniforms {\n");
        for field in &self.fields {
            out.push_str(&format!(
                "    {} {MEMBER_PREFIX}{};\n",
                field.kind.glsl(),
                field.name
            ));
        }
        out.push_str(&format!("}} {BLOCK_INSTANCE};\n"));
        for field in &self.fields {
            out.push_str(&format!(
                "#define {name} {BLOCK_INSTANCE}.{MEMBER_PREFIX}{name}\n",
                name = field.name
            ));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TranslatedStage {
    pub stage: ShaderStage,
    pub source: String,
    pub block: UniformBlock,
    /// Vertex inputs, indexed by their assigned location.
    pub attributes: Vec<String>,
}

pub(crate) fn translate_stage(stage: ShaderStage, source: &str) -> Result<TranslatedStage, String> {
    let mut block = UniformBlock::default();
    let mut attributes = Vec::new();
    let mut varyings = 0u32;
    let mut body = String::with_capacity(source.len());

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
            body.push('\n');
            continue;
        }

        match declaration(trimmed) {
            Some(("uniform", ty, name)) => {
                let kind = UniformKind::parse(ty).ok_or_else(|| {
                    format!("ERROR: 0:{}: unsupported uniform type '{ty}'", index + 1)
                })?;
                block
                    .push(name, kind)
                    .map_err(|err| format!("ERROR: 0:{}: {err}", index + 1))?;
                body.push('\n');
            }
            Some(("attribute", ty, name)) if stage == ShaderStage::Vertex => {
                body.push_str(&format!(
                    "layout(location = {}) in {ty} {name};\n",
                    attributes.len()
                ));
                attributes.push(name.to_string());
            }
            Some(("varying", ty, name)) => {
                let direction = match stage {
                    ShaderStage::Vertex => "out",
                    ShaderStage::Fragment => "in",
                };
                body.push_str(&format!(
                    "layout(location = {varyings}) {direction} {ty} {name};\n"
                ));
                varyings += 1;
            }
            _ => {
                body.push_str(line);
                body.push('\n');
            }
        }
    }

    let mut out = String::from("#version 450\n");
    if !block.is_empty() {
        out.push_str(&block.declaration());
    }
    if stage == ShaderStage::Fragment {
        out.push_str(FRAGMENT_HEADER);
    }
    out.push_str("#line 1\n");
    out.push_str(&body);
    if stage == ShaderStage::Fragment {
        let flipped_y = if block.field("iResolution").is_some() {
            "iResolution.y - gl_FragCoord.y"
        } else {
            "gl_FragCoord.y"
        };
        out.push_str(&FRAGMENT_FOOTER.replace("{flipped_y}", flipped_y));
    }

    Ok(TranslatedStage {
        stage,
        source: out,
        block,
        attributes,
    })
}

/// Splits `<qualifier> <type> <name>;` into its three words.
fn declaration(line: &str) -> Option<(&str, &str, &str)> {
    let mut words = line.strip_suffix(';')?.split_whitespace();
    let qualifier = words.next()?;
    if !matches!(qualifier, "uniform" | "attribute" | "varying") {
        return None;
    }
    let ty = words.next()?;
    let name = words.next()?;
    words.next().is_none().then_some((qualifier, ty, name))
}

const FRAGMENT_HEADER: &str = r"layout(location = 0) out vec4 lightning_frag_color;
vec4 lightning_frag_coord;
#define gl_FragColor lightning_frag_color
#define gl_FragCoord lightning_frag_coord
#define main lightning_main
";

const FRAGMENT_FOOTER: &str = r"#undef main
#undef gl_FragCoord
void main() {
    lightning_frag_coord = vec4(gl_FragCoord.x, {flipped_y}, gl_FragCoord.z, gl_FragCoord.w);
    lightning_main();
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    #[test]
    fn fragment_uniforms_move_into_std140_block() {
        let translated = translate_stage(ShaderStage::Fragment, FRAGMENT_SHADER.text).unwrap();
        let source = &translated.source;
        assert!(source.starts_with("#version 450\n"));
        assert!(!source.contains("precision mediump float"));
        assert!(!source.contains("uniform float iTime;"));
        assert!(source.contains("#define iTime lightning_uniforms.lightning_iTime"));
        assert!(source.contains("#define gl_FragColor lightning_frag_color"));
        assert!(source.contains("iResolution.y - gl_FragCoord.y"));
        assert!(source.contains("mainImage(gl_FragColor, gl_FragCoord.xy);"));
    }

    #[test]
    fn block_offsets_follow_std140() {
        let translated = translate_stage(ShaderStage::Fragment, FRAGMENT_SHADER.text).unwrap();
        let block = &translated.block;
        let offset = |name: &str| block.field(name).map(|field| field.offset);
        assert_eq!(offset("iResolution"), Some(0));
        assert_eq!(offset("iTime"), Some(2));
        assert_eq!(offset("uHue"), Some(3));
        assert_eq!(offset("uSize"), Some(7));
        assert_eq!(block.padded_len(), 8);
    }

    #[test]
    fn float_before_vec2_is_padded() {
        let source = "uniform float a;\nuniform vec2 b;\nuniform vec3 c;\nvoid main() {}\n";
        let translated = translate_stage(ShaderStage::Fragment, source).unwrap();
        let block = &translated.block;
        assert_eq!(block.field("a").map(|f| f.offset), Some(0));
        assert_eq!(block.field("b").map(|f| f.offset), Some(2));
        assert_eq!(block.field("c").map(|f| f.offset), Some(4));
        assert_eq!(block.padded_len(), 8);
    }

    #[test]
    fn vertex_attribute_gets_location_and_no_block() {
        let translated = translate_stage(ShaderStage::Vertex, VERTEX_SHADER.text).unwrap();
        assert_eq!(translated.attributes, ["aPosition"]);
        assert!(translated.block.is_empty());
        assert!(translated
            .source
            .contains("layout(location = 0) in vec2 aPosition;"));
        assert!(!translated.source.contains("LightningUniforms"));
    }

    #[test]
    fn stripped_lines_keep_source_numbering() {
        let translated = translate_stage(ShaderStage::Fragment, FRAGMENT_SHADER.text).unwrap();
        let body = translated
            .source
            .split_once("#line 1\n")
            .map(|(_, body)| body)
            .unwrap();
        let source_line = FRAGMENT_SHADER
            .text
            .lines()
            .position(|line| line.contains("float hash11"))
            .unwrap();
        let translated_line = body
            .lines()
            .position(|line| line.contains("float hash11"))
            .unwrap();
        assert_eq!(source_line, translated_line);
    }

    #[test]
    fn unsupported_uniform_type_is_reported_with_line() {
        let err = translate_stage(ShaderStage::Fragment, "\nuniform sampler2D tex;\n").unwrap_err();
        assert!(err.contains("0:2"), "{err}");
        assert!(err.contains("sampler2D"), "{err}");
    }
}
