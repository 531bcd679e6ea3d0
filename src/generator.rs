use serde::Serialize;

use crate::{
    CoreConfiguration, Error, GenerationRequest, HexTable, Metadata, Mode, RotationCore, SineTable,
    SplineConfiguration, SplineCore, TableConfiguration, hdl::Verilog,
};

/// Rendered Verilog source
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Module {
    /// Module identifier
    pub name: String,
    /// Output file the module is meant for
    pub file_name: String,
    /// Source text
    pub text: String,
}

/// Everything one request produces
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Artifacts {
    /// The core
    pub module: Module,
    /// Error model and parameters, for the cores that have one
    pub metadata: Option<Metadata>,
    /// `$readmemh` tables the module loads
    pub tables: Vec<HexTable>,
}

/// Request to artifacts
///
/// ```
/// # use cordicgen::*;
/// let req = GenerationRequest::new(Mode::QuarterWave).output_width(8);
/// let out = Generator::generate(&req).unwrap();
/// assert_eq!(out.module.name, "quarterwav");
/// assert_eq!(out.tables[0].path(), "quarterwav.hex");
/// assert!(out.metadata.is_none());
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct Generator;

impl Generator {
    /// Resolve the request, derive the tables and render the module
    pub fn generate(req: &GenerationRequest) -> Result<Artifacts, Error> {
        let file_name = req.output_file();
        log::info!("Generating {} into {file_name}", req.mode().as_ref());
        let (name, text, metadata, tables) = match req.mode() {
            Mode::Rotate
            | Mode::SequentialRotate
            | Mode::Vectoring
            | Mode::SequentialVectoring => {
                let cfg = CoreConfiguration::resolve(req)?;
                log::debug!("{cfg:?}");
                let core = RotationCore::new(&cfg, file_name);
                let meta = Metadata::rotation(core.name(), &cfg);
                (core.name().to_string(), core.module_text()?, Some(meta), vec![])
            }
            Mode::SineTable | Mode::QuarterWave => {
                let cfg = TableConfiguration::resolve(req)?;
                log::debug!("{cfg:?}");
                let core = SineTable::new(&cfg, file_name);
                let table = core.hex_table()?;
                (core.name().to_string(), core.module_text()?, None, vec![table])
            }
            Mode::QuadraticTable => {
                let cfg = SplineConfiguration::resolve(req)?;
                log::debug!("{cfg:?}");
                let core = SplineCore::new(&cfg, file_name)?;
                let meta = Metadata::spline(core.name(), &cfg, core.table());
                (
                    core.name().to_string(),
                    core.module_text()?,
                    Some(meta),
                    core.hex_tables()?,
                )
            }
        };
        Ok(Artifacts {
            module: Module {
                name,
                file_name: file_name.into(),
                text,
            },
            metadata,
            tables,
        })
    }
}
