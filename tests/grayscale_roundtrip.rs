// Grayscale codec round trips through the public API: quality behaviour, shape
// handling, and how damaged containers are reported.

#[cfg(test)]
mod grayscale_roundtrip {
    use dctpack_rs::codec::grayscale::ChannelContainer;
    use dctpack_rs::codec::huffman;
    use dctpack_rs::metrics::{mse, psnr};
    use dctpack_rs::{CodecError, GrayscaleCodec, Plane};

    fn textured_plane(width: u32, height: u32) -> Plane {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(((x * 7 + y * 3 + (x * y * 31 + x * 13) % 23) % 256) as u8);
            }
        }
        Plane::new(width, height, data).unwrap()
    }

    fn container_for_stream(stream: &[u8]) -> Vec<u8> {
        let (table, payload) = huffman::compress(stream).unwrap();
        ChannelContainer {
            table,
            payload: payload.bytes,
            bit_count: payload.bit_count,
        }
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn test_mse_non_increasing_with_quality() {
        let plane = textured_plane(32, 16);
        let mut previous = f64::INFINITY;
        for quality in [1, 5, 10, 25, 50, 75, 90, 95, 100] {
            let codec = GrayscaleCodec::new(quality).unwrap();
            let encoded = codec.encode(&plane).unwrap();
            let decoded = codec.decode_with_shape(&encoded.bytes, 32, 16).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 16));

            let error = mse(plane.data(), decoded.data()).unwrap();
            assert!(
                error <= previous,
                "MSE rose from {} to {} at quality {}",
                previous,
                error,
                quality
            );
            previous = error;
        }
        assert!(previous < 1.0);
    }

    #[test]
    fn test_high_quality_is_close() {
        let plane = textured_plane(64, 64);
        let codec = GrayscaleCodec::new(95).unwrap();
        let encoded = codec.encode(&plane).unwrap();
        let decoded = codec.decode(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
        assert!(psnr(plane.data(), decoded.data()).unwrap() > 40.0);
        assert!(encoded.payload_bits <= encoded.stream_len as u64 * 8);
    }

    #[test]
    fn test_flat_plane_single_symbol_stream() {
        let plane = Plane::new(24, 16, vec![128; 24 * 16]).unwrap();
        let codec = GrayscaleCodec::new(50).unwrap();
        let encoded = codec.encode(&plane).unwrap();

        assert_eq!(encoded.table.len(), 1);
        assert_eq!(encoded.table.entries()[0].symbol, 0);
        assert_eq!(encoded.stream_len, 6 * 3);
        assert_eq!(encoded.payload_bits, 18);

        let decoded = codec
            .decode_with_table(&encoded.bytes, &encoded.table, 24, 16)
            .unwrap();
        assert_eq!(decoded, plane);
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let plane = Plane::new(8, 8, vec![128; 64]).unwrap();
        let codec = GrayscaleCodec::new(50).unwrap();
        let mut bytes = codec.encode(&plane).unwrap().bytes;

        // The only code is "0"; a set bit has nowhere to go.
        let last = bytes.len() - 1;
        bytes[last] = 0xFF;
        let error = codec.decode(&bytes).unwrap_err();
        assert!(matches!(error, CodecError::CorruptStream(_)));
        assert!(error.is_stream_error());

        assert!(matches!(codec.decode(&bytes[..6]), Err(CodecError::NeedMoreData)));
        assert!(matches!(codec.decode(&[]), Err(CodecError::NeedMoreData)));
    }

    #[test]
    fn test_malformed_block_decodes_leniently() {
        // DC difference 4, then a run that overshoots the block.
        let bytes = container_for_stream(&[4, 70, 9]);
        let codec = GrayscaleCodec::new(50).unwrap();
        let plane = codec.decode_with_shape(&bytes, 8, 8).unwrap();
        // DC 4 * 16 = 64 -> +8 after the inverse transform.
        assert!(plane.data().iter().all(|&v| v == 136));
    }

    #[test]
    fn test_runaway_dc_differences_do_not_overflow() {
        // Escaped DC difference +32767 followed by end-of-block, repeated.
        let stream: Vec<u8> = [0x80, 0x7F, 0xFF, 0x00, 0x00].repeat(3000);
        let bytes = container_for_stream(&stream);
        let codec = GrayscaleCodec::new(1).unwrap();

        // Every out-of-range DC is a malformed block; the rest of the stream
        // resynchronises into 3000 blocks, inferred as 60x50.
        let plane = codec.decode(&bytes).unwrap();
        assert_eq!((plane.width(), plane.height()), (480, 400));
        // The first block keeps the starting DC of zero: flat mid-gray.
        for row in plane.data().chunks_exact(480).take(8) {
            assert!(row[..8].iter().all(|&v| v == 128));
        }
    }

    #[test]
    fn test_quality_travels_with_the_codec() {
        let plane = textured_plane(16, 16);
        let encoded = GrayscaleCodec::new(20).unwrap().encode(&plane).unwrap();
        let right = GrayscaleCodec::new(20).unwrap().decode(&encoded.bytes).unwrap();
        let wrong = GrayscaleCodec::new(90).unwrap().decode(&encoded.bytes).unwrap();
        assert!(mse(plane.data(), right.data()).unwrap() < mse(plane.data(), wrong.data()).unwrap());
    }
}
