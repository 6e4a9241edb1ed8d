use ndarray::{Array2, ArrayD, IxDyn};

use holo_core::error::HoloError;
use holo_core::image::{Axis, Image, SignalAxes};

#[test]
fn test_from_array_splits_navigation_and_signal() {
    let image = Image::from_array(ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4, 5]))).unwrap();
    assert_eq!(image.nav.len(), 2);
    assert_eq!(image.nav_shape(), vec![2, 3]);
    assert_eq!(image.nav_len(), 6);
    assert_eq!(image.signal_shape(), (4, 5));
    assert_eq!(image.signal.x.scale, 1.0);
    assert_eq!(image.signal.y.offset, 0.0);
}

#[test]
fn test_one_dimensional_data_is_rejected() {
    let result = Image::from_array(ArrayD::<f64>::zeros(IxDyn(&[7])));
    assert!(matches!(result, Err(HoloError::ShapeMismatch { .. })));
}

#[test]
fn test_constructor_checks_axis_sizes() {
    let signal = SignalAxes {
        x: Axis::new(4),
        y: Axis::new(3),
    };
    let data = ArrayD::<f64>::zeros(IxDyn(&[4, 3]));
    assert!(matches!(
        Image::new(data, Vec::new(), signal),
        Err(HoloError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_from_series_stacks_along_new_axis() {
    let slices = vec![
        Array2::from_elem((2, 3), 1.0),
        Array2::from_elem((2, 3), 2.0),
    ];
    let axis = Axis::from_values(&[-5.0, 5.0]).with_name("defocus");
    let series = Image::from_series(slices, axis).unwrap();
    assert_eq!(series.data.shape(), &[2, 2, 3]);
    assert_eq!(series.data[[1, 1, 2]], 2.0);
    assert_eq!(series.nav[0].name.as_deref(), Some("defocus"));

    let empty: Vec<Array2<f64>> = Vec::new();
    assert!(matches!(
        Image::from_series(empty, Axis::new(0)),
        Err(HoloError::EmptySequence)
    ));
}

#[test]
fn test_nav_axis_replacement_must_keep_size() {
    let image = Image::from_array(ArrayD::<f64>::zeros(IxDyn(&[3, 2, 2]))).unwrap();
    assert!(image.clone().with_nav_axis(0, Axis::new(3)).is_ok());
    assert!(image.clone().with_nav_axis(0, Axis::new(4)).is_err());
    assert!(image.with_nav_axis(1, Axis::new(3)).is_err());
}

#[test]
fn test_map_slices_keeps_navigation_layout() {
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 2, 2]), |idx| (idx[0] * 3 + idx[1]) as f64);
    let image = Image::from_array(data).unwrap();
    let mapped = image.map_slices(|s| s.mapv(|v| v * 10.0)).unwrap();
    assert_eq!(mapped.shape(), &[2, 3, 2, 2]);
    assert_eq!(mapped[[1, 2, 0, 1]], 50.0);
    assert_eq!(image.slices().unwrap().len(), 6);
}

#[test]
fn test_signal_plane_drops_navigation_axes() {
    let data = ArrayD::from_shape_fn(IxDyn(&[3, 2, 4]), |idx| (idx[0] * 10 + idx[2]) as f64);
    let image = Image::from_array(data)
        .unwrap()
        .with_nav_axis(0, Axis::from_values(&[-1.0, 0.0, 1.0]))
        .unwrap()
        .with_scales([0.5, 0.25])
        .with_units("um");

    let plane = image.signal_plane().unwrap();
    assert!(plane.nav.is_empty());
    assert_eq!(plane.data.shape(), &[2, 4]);
    assert_eq!(plane.data[[1, 3]], 3.0);
    assert_eq!(plane.signal, image.signal);

    let empty = Image::from_array(ArrayD::<f64>::zeros(IxDyn(&[0, 2, 2]))).unwrap();
    assert!(matches!(empty.signal_plane(), Err(HoloError::EmptySequence)));
}
