//! Shader compilation and program linking from source files.

use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    gpu::{Gpu, ProgramId, ShaderId, ShaderStage, VertexLayout},
    resources::ResourceRegistry,
};

/// Compiles a single stage. The driver's diagnostic ends up in [`Error::ShaderCompile`].
pub fn compile_shader(gpu: &mut dyn Gpu, stage: ShaderStage, source: &str) -> Result<ShaderId> {
    gpu.compile_shader(stage, source)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds a program from `(stage, path)` pairs and registers it.
///
/// All files are read before anything is compiled. Stage objects never outlive this call, whether
/// compilation or linking fails or not.
pub fn load_program(
    gpu: &mut dyn Gpu,
    registry: &mut ResourceRegistry,
    stages: &[(ShaderStage, PathBuf)],
    layout: &VertexLayout,
) -> Result<ProgramId> {
    let sources = stages
        .iter()
        .map(|(stage, path)| Ok((*stage, path, read_source(path)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut compiled = Vec::with_capacity(sources.len());
    for (stage, path, source) in &sources {
        match compile_shader(gpu, *stage, source) {
            Ok(shader) => compiled.push(shader),
            Err(e) => {
                log::error!("failed to compile {}", path.display());
                for shader in compiled {
                    gpu.delete_shader(shader);
                }
                return Err(e);
            }
        }
    }

    let linked = gpu.link_program(&compiled, layout);
    for shader in compiled {
        gpu.delete_shader(shader);
    }
    let program = linked?;
    registry.track_program(program);
    log::info!(
        "loaded {program} from {}",
        sources
            .iter()
            .map(|(_, path, _)| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(program)
}
