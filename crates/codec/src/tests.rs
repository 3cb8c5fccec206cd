use super::*;
use proptest::prelude::*;

#[test]
fn int_round_trips() {
    let mut buf = [0u8; 8];
    write_i64(&mut buf, -12345).unwrap();
    assert_eq!(read_i64(&buf).unwrap(), -12345);

    let mut buf = [0u8; 4];
    write_i32(&mut buf, i32::MIN).unwrap();
    assert_eq!(read_i32(&buf).unwrap(), i32::MIN);
}

#[test]
fn big_endian_byte_order() {
    let mut buf = [0u8; 4];
    write_i32(&mut buf, 0x01020304).unwrap();
    assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn narrow_int_rejects_overflow() {
    let mut buf = [0u8; 3];
    assert!(write_int_be(&mut buf, 1 << 23, 3).is_err());
    assert!(write_int_be(&mut buf, (1 << 23) - 1, 3).is_ok());
}

#[test]
fn float_round_trips_bit_pattern() {
    let mut buf = [0u8; 4];
    write_f32(&mut buf, f32::NAN).unwrap();
    assert_eq!(read_f32(&buf).unwrap().to_bits(), f32::NAN.to_bits());

    let mut buf = [0u8; 8];
    write_f64(&mut buf, -0.0).unwrap();
    assert_eq!(read_f64(&buf).unwrap().to_bits(), (-0.0f64).to_bits());
}

#[test]
fn fixed_string_pads_and_trims() {
    let mut buf = [0xffu8; 8];
    write_str_fixed(&mut buf, "hi", 8).unwrap();
    assert_eq!(&buf[2..], &[0u8; 6]);
    assert_eq!(read_str_fixed(&buf, 8).unwrap(), "hi");
}

#[test]
fn fixed_string_truncates_on_code_point_boundary() {
    let s = "a\u{1F600}"; // 'a' + 4-byte emoji, 5 bytes total
    let mut buf = [0u8; 4];
    write_str_fixed(&mut buf, s, 4).unwrap();
    // truncating mid-emoji must not leave a dangling continuation byte
    assert_eq!(read_str_fixed(&buf, 4).unwrap(), "a");
}

#[test]
fn date_time_timestamp_round_trip_at_extremes() {
    let mut buf = [0u8; 3];
    write_date(&mut buf, -(1 << 23)).unwrap();
    assert_eq!(read_date(&buf).unwrap(), -(1 << 23));

    let mut buf = [0u8; 5];
    write_time(&mut buf, (1i64 << 39) - 1).unwrap();
    assert_eq!(read_time(&buf).unwrap(), (1i64 << 39) - 1);

    let mut buf = [0u8; 8];
    write_timestamp(&mut buf, i64::MIN).unwrap();
    assert_eq!(read_timestamp(&buf).unwrap(), i64::MIN);
}

proptest! {
    #[test]
    fn i32_round_trips(v in any::<i32>()) {
        let mut buf = [0u8; 4];
        write_i32(&mut buf, v).unwrap();
        prop_assert_eq!(read_i32(&buf).unwrap(), v);
    }

    #[test]
    fn i64_round_trips(v in any::<i64>()) {
        let mut buf = [0u8; 8];
        write_i64(&mut buf, v).unwrap();
        prop_assert_eq!(read_i64(&buf).unwrap(), v);
    }

    #[test]
    fn date_round_trips(v in -(1i32 << 23)..(1i32 << 23)) {
        let mut buf = [0u8; 3];
        write_date(&mut buf, v).unwrap();
        prop_assert_eq!(read_date(&buf).unwrap(), v);
    }

    #[test]
    fn fixed_string_never_panics(s in ".{0,20}", len in 0usize..20) {
        let mut buf = vec![0u8; len];
        let _ = write_str_fixed(&mut buf, &s, len);
    }
}
