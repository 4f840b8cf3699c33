extern crate xylem;

#[cfg(test)]
mod codec_spec {
    use xylem::prelude::*;

    fn host_stream() -> Stream {
        Platform::global().host_device().stream().unwrap()
    }

    #[test]
    fn it_round_trips_a_named_tensor() {
        let stream = host_stream();
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.5).collect();
        let tensor = Tensor::<f32>::matrix(3, 4, data.clone()).unwrap();

        let mut encoded = Vec::new();
        encode("weights", &tensor, &stream, &mut encoded).unwrap();

        let (name, decoded) = decode::<f32, _>(&mut &encoded[..]).unwrap();
        assert_eq!(name, "weights");
        assert_eq!(decoded.element_count(), tensor.element_count());
        assert_eq!(decoded.to_vec(&stream).unwrap(), data);
    }

    #[test]
    fn it_round_trips_composite_elements() {
        let stream = host_stream();
        let tensor = Tensor::<Rgb<u8>>::vector(vec![
            Rgb { r: 10, g: 20, b: 30 },
            Rgb { r: 40, g: 50, b: 60 },
        ]).unwrap();

        let mut encoded = Vec::new();
        encode("pixels", &tensor, &stream, &mut encoded).unwrap();

        let (_, decoded) = decode::<Rgb<u8>, _>(&mut &encoded[..]).unwrap();
        assert_eq!(decoded.to_vec(&stream).unwrap(), tensor.to_vec(&stream).unwrap());
    }

    #[test]
    fn it_rejects_an_element_kind_mismatch() {
        let stream = host_stream();
        let tensor = Tensor::<f32>::vector(vec![1.0, 2.0]).unwrap();

        let mut encoded = Vec::new();
        encode("floats", &tensor, &stream, &mut encoded).unwrap();

        let mismatched = decode::<i32, _>(&mut &encoded[..]);
        assert_eq!(mismatched.unwrap_err().kind(), ErrorKind::IncompatibleShape);
    }

    #[test]
    fn it_encodes_a_view_rather_than_the_whole_storage() {
        let stream = host_stream();
        let parent = Tensor::<f32>::matrix(4, 4, (0..16).map(|i| i as f32).collect()).unwrap();
        let window = parent.sub_view(&[1, 1], &[2, 2], false).unwrap();

        let mut encoded = Vec::new();
        encode("window", &window, &stream, &mut encoded).unwrap();

        let (_, decoded) = decode::<f32, _>(&mut &encoded[..]).unwrap();
        assert_eq!(decoded.to_vec(&stream).unwrap(), vec![5.0, 6.0, 9.0, 10.0]);
    }
}
