use std::f64::consts::PI;

use mwm_core::{
    Component, InterpolationBounds, ModeLabel, Polarization, SampleQuality, Samples, ThreadPool,
    WaveguideConfig,
};

// Default grid (lmax 5, lmin 0.4, limag 5, dw 1/64). Orders 0..3 cover every
// mode checked below.
const CONFIG: &str = r#"
[core]
shape = "slit"
size = 0.3
fill = { RI = 1.0 }

[clad]
model = "gold_dl"

[modes]
num_n = 4
"#;

#[test]
fn test_gold_slit_interpolated_at_one_micron() {
    let config = WaveguideConfig::from_toml_str(CONFIG).expect("config should parse");
    let samples = Samples::from_config(&config).expect("samples should build");
    assert_eq!(samples.ws()[0], 1.25);

    let pool = ThreadPool::new(4).unwrap();
    let set = samples.compute(&pool).expect("sweeps should run");
    let bounds = InterpolationBounds {
        lmax: 3.0,
        lmin: 0.575,
        limag: 10.0,
    };
    let funcs = samples.interpolation(&set, &bounds).unwrap();

    let w = 2.0 * PI;
    let expected = [
        (Polarization::M, 0, 6.78093154, 0.01839788),
        (Polarization::M, 1, 0.02905019, 7.60162343),
        (Polarization::M, 2, 0.00734511, 19.70308619),
        (Polarization::M, 3, -0.00016907, 30.64071297),
        (Polarization::E, 1, 0.05963503, 6.53937945),
        (Polarization::E, 2, 0.09734932, 16.95279102),
        (Polarization::E, 3, 0.15859949, 26.20793155),
    ];
    for (pol, n, re, im) in expected {
        let label = ModeLabel::new(pol, n, 1);
        let got_re = funcs.value_at(label, Component::Real, w, 0.0).unwrap();
        let got_im = funcs.value_at(label, Component::Imag, w, 0.0).unwrap();
        assert!(
            (got_re - re).abs() < 1e-6 && (got_im - im).abs() < 1e-6,
            "{}: {} {:+}i, expected {} {:+}i",
            label,
            got_re,
            got_im,
            re,
            im
        );
        assert_eq!(
            funcs.get(label, Component::Real).unwrap().quality(w, 0.0).unwrap(),
            SampleQuality::Converged
        );
    }
}
