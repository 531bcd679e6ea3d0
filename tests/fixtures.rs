use core::f64::consts::PI;

use cordicgen::{
    CoreConfiguration, ErrorModel, GenerationRequest, Generator, Metadata, Mode, ResetPolicy,
    SplineConfiguration, SplineCore, angle_table, gain, minimal_stage_count,
    model::{Clocked, Datapath, PipelinedCore, Sample, Value},
};
use rand::{prelude::*, rngs::StdRng};

fn rotate16() -> GenerationRequest {
    GenerationRequest::new(Mode::Rotate)
        .input_width(16)
        .output_width(16)
}

#[test]
fn rotation_parameters() {
    let cfg = CoreConfiguration::resolve(&rotate16()).unwrap();
    assert_eq!(cfg.working_width(), 19);
    assert_eq!(cfg.phase_bits(), 23);
    assert_eq!(cfg.stage_count(), 19);
    assert_eq!(cfg.latency(), 21);

    let angles = angle_table(cfg.stage_count(), cfg.phase_bits());
    assert!(angles.windows(2).all(|w| w[0].phase_units >= w[1].phase_units));
    assert!(angles.iter().all(|a| a.phase_units > 0));

    let cfg = CoreConfiguration::resolve(&GenerationRequest::new(Mode::Vectoring).input_width(16))
        .unwrap();
    assert_eq!(cfg.working_width(), 20);
    assert_eq!(cfg.phase_bits(), 24);
    assert_eq!(cfg.stage_count(), 20);
    assert!(minimal_stage_count(64, 24) > 20);
}

#[test]
fn rotation_error_record() {
    let req = GenerationRequest::new(Mode::Rotate)
        .input_width(12)
        .output_width(12)
        .file_name("cordic12.v");
    let out = Generator::generate(&req).unwrap();
    let Some(meta @ Metadata::Rotation(rot)) = &out.metadata else {
        panic!("rotation metadata expected");
    };
    assert_eq!(rot.config.phase_bits(), 19);
    assert_eq!(rot.config.stage_count(), 15);
    assert_eq!(rot.error, ErrorModel::new(&rot.config));
    assert!((rot.error.gain - 1.16443535).abs() < 1e-8);
    assert!((rot.error.quantization_variance - 0.275037).abs() < 1e-6);
    assert!((rot.error.phase_variance_rad / 8.7713e-10 - 1.0).abs() < 1e-4);
    assert!((rot.error.best_possible_cnr_db - 72.978).abs() < 1e-3);

    let header = meta.header().unwrap();
    assert!(header.contains("QUANTIZATION_VARIANCE = 2.7504e-01;"));
    assert!(header.contains("PHASE_VARIANCE_RAD = 8.7713e-10;"));
    assert!(header.contains("BEST_POSSIBLE_CNR = 72.98;"));
    let json = meta.to_json().unwrap();
    assert!(json.contains("\"best_possible_cnr_db\""));
}

#[test]
fn rotation_end_to_end() {
    let req = rotate16().aux(true).file_name("rtl/cordic.v");
    let out = Generator::generate(&req).unwrap();
    assert_eq!(out.module.name, "cordic");
    assert!(out.module.text.contains("NSTAGES=19"));
    assert!(out.tables.is_empty());
    let Some(Metadata::Rotation(meta)) = &out.metadata else {
        panic!("rotation metadata expected");
    };
    assert_eq!(meta.error.gain, gain(19));
    assert_eq!(meta.latency, 21);
    assert!(meta.error.best_possible_cnr_db > 80.0);

    // The model of the same configuration rotates a large vector
    let mut core = PipelinedCore::new(&meta.config);
    let g = gain(19) / 2.0;
    let turn = (1u64 << 23) as f64;
    let mut rng = StdRng::seed_from_u64(42);
    let phases: Vec<u64> = (0..64).map(|_| rng.random_range(0..1u64 << 23)).collect();
    let lag = meta.latency as usize - 1;
    let mut outputs = Vec::new();
    for k in 0..phases.len() + lag {
        let phase = phases.get(k).copied().unwrap_or(0);
        let o = core.clock(Some(Sample {
            x: 20000,
            y: 0,
            phase,
            aux: k < phases.len(),
        }));
        if k >= lag {
            outputs.push(o);
        }
    }
    for (o, p) in outputs.iter().zip(&phases) {
        assert!(o.aux);
        let Value::Rect { x, y } = o.value else {
            panic!("rectangular output expected");
        };
        let (s, c) = (2.0 * PI * *p as f64 / turn).sin_cos();
        assert!((x as f64 - 20000.0 * g * c).abs() < 2.5);
        assert!((y as f64 - 20000.0 * g * s).abs() < 2.5);
    }
}

#[test]
fn vectoring_end_to_end() {
    let req = GenerationRequest::new(Mode::SequentialVectoring)
        .input_width(16)
        .reset(ResetPolicy::Async);
    let out = Generator::generate(&req).unwrap();
    assert!(out.module.text.contains("o_busy"));
    assert!(out.module.text.contains("negedge i_areset_n"));
    let Some(meta) = out.metadata else {
        panic!("metadata expected");
    };
    let header = meta.header().unwrap();
    assert!(header.contains("#define\tCLOCKS_PER_OUTPUT\t22\n"));
    assert!(header.contains("#define\tASYNC_RESET\n"));

    let Metadata::Rotation(meta) = meta else {
        panic!("rotation metadata expected");
    };
    let dp = Datapath::new(&meta.config);
    let Value::Polar { mag, phase } = dp.evaluate(&Sample {
        x: 0,
        y: 20000,
        phase: 0,
        aux: false,
    }) else {
        panic!("polar output expected");
    };
    // Phase error seen as a tangential displacement in output LSBs
    let quarter = (1u64 << 22) as f64;
    let tangential = (phase as f64 - quarter) * 2.0 * PI / (1u64 << 24) as f64 * 20000.0;
    assert!(tangential.abs() < 2.5);
    let expect = 20000.0 * meta.error.gain / 2.0;
    assert!((mag as f64 - expect).abs() < 3.0);
}

#[test]
fn spline_fixture() {
    let req = GenerationRequest::new(Mode::QuadraticTable)
        .output_width(13)
        .extra_bits(3)
        .phase_bits(18)
        .aux(true);
    let cfg = SplineConfiguration::resolve(&req).unwrap();
    let core = SplineCore::new(&cfg, req.output_file()).unwrap();
    let t = core.table();
    assert_eq!(t.log2_size(), 6);
    assert!((t.error_sine() + 3.798e-6).abs() < 1e-8);
    assert!((t.spur_db() + 107.97).abs() < 5e-3);

    let out = Generator::generate(&req).unwrap();
    let Some(Metadata::Spline(meta)) = &out.metadata else {
        panic!("spline metadata expected");
    };
    assert_eq!(meta.log2_size, 6);
    assert_eq!(meta.latency, 6);
    let names: Vec<_> = out.tables.iter().map(|t| t.path()).collect();
    assert_eq!(names, ["quadtbl_ctbl.hex", "quadtbl_ltbl.hex", "quadtbl_qtbl.hex"]);
    let bits: Vec<_> = out.tables.iter().map(|t| t.bits()).collect();
    assert_eq!(bits, [16, 13, 9]);
    let ctbl = out.tables[0].to_string();
    assert!(ctbl.starts_with("@00000000 0000 0c8b 18f8 2527 "));
    assert_eq!(ctbl.lines().count(), 8);
    assert!(out.module.text.contains("LGTBL= 6"));
}

#[test]
fn sine_tables() {
    let req = GenerationRequest::new(Mode::SineTable)
        .output_width(8)
        .phase_bits(6)
        .file_name("sin.v");
    let out = Generator::generate(&req).unwrap();
    assert_eq!(out.tables.len(), 1);
    assert_eq!(out.tables[0].data().len(), 64);
    assert!(out.tables[0].to_string().starts_with("@00000000 00 0c 18 24 "));
    assert!(out.module.text.contains("$readmemh(\"sin.hex\", tbl);"));
    assert!(out.metadata.is_none());

    let q = Generator::generate(
        &GenerationRequest::new(Mode::QuarterWave)
            .output_width(8)
            .phase_bits(6),
    )
    .unwrap();
    assert_eq!(q.tables[0].data().len(), 16);
    assert!(q.module.text.contains("quartertable[index]"));
}
