use laser_scan_core::{
    CalibrationModel, CalibrationParameters, ChannelOrder, Frame, StripeChannel,
    StripeObservation,
};
use laser_scan_stripe::{StripeDetector, StripeDetectorParams};

fn reference_frame(column: usize, rows: std::ops::Range<usize>) -> Frame {
    let mut frame = Frame::filled(1280, 960, ChannelOrder::Bgr, 30).expect("frame");
    for y in rows {
        frame.set_pixel(column, y, &[60, 80, 240]);
    }
    frame
}

#[test]
fn stripe_at_reference_column_projects_to_reference_distance() {
    let params = CalibrationParameters::default();
    let model = CalibrationModel::new(params.clone()).expect("calibration");
    let detector = StripeDetector::new(StripeDetectorParams::from_calibration(
        &params,
        StripeChannel::Red,
    ));

    let frame = reference_frame(351, 380..420);
    let observations = detector.detect_all(&frame.view());
    assert_eq!(observations.len(), 40);
    assert!(observations.iter().all(|o| o.column == 351));

    for obs in &observations {
        let p = model
            .project_observation(obs, params.perpendicular_pulse_width)
            .expect("finite point");
        assert!((p.x - 17.0).abs() < 1e-9, "x = {}", p.x);
    }

    let at_400 = StripeObservation {
        row: 400,
        column: 351,
    };
    assert!(observations.contains(&at_400));
}

#[test]
fn heights_increase_towards_the_top_of_the_frame() {
    let params = CalibrationParameters::default();
    let model = CalibrationModel::new(params.clone()).expect("calibration");
    let detector = StripeDetector::new(StripeDetectorParams::default());

    let frame = reference_frame(216, 100..900);
    let heights: Vec<f64> = detector
        .detect(&frame.view())
        .filter_map(|o| model.project_observation(&o, 1863))
        .map(|p| p.y)
        .collect();

    assert_eq!(heights.len(), 800);
    assert!(heights.windows(2).all(|w| w[0] > w[1]));
}
