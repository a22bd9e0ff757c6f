/// Deserialization tests for the wire types, using payloads shaped like real
/// TrackSolid responses (mixed string/number scalars included).
#[cfg(test)]
mod unit {
    use crate::types::{parse_wire_time, Envelope, Scalar, TokenResult, WireDevice, WirePoint};
    use crate::TrackSolidError;

    #[test]
    fn scalar_accepts_strings_and_numbers() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[1, 2.5, "3.25", " 4 ", true, ""]"#).unwrap();
        assert_eq!(values[0].as_f64(), Some(1.0));
        assert_eq!(values[1].as_f64(), Some(2.5));
        assert_eq!(values[2].as_f64(), Some(3.25));
        assert_eq!(values[3].as_i64(), Some(4));
        assert_eq!(values[4].as_flag(), Some(true));
        assert_eq!(values[5].as_text(), None);
        assert_eq!(values[5].as_f64(), None);
    }

    #[test]
    fn flags_only_accept_zero_and_one() {
        let values: Vec<Scalar> = serde_json::from_str(r#"["1", "0", 0, 2, "yes"]"#).unwrap();
        let flags: Vec<_> = values.iter().map(Scalar::as_flag).collect();
        assert_eq!(flags, [Some(true), Some(false), Some(false), None, None]);
    }

    #[test]
    fn envelope_success_yields_result() {
        let env: Envelope<TokenResult> = serde_json::from_str(
            r#"{"code":0,"message":"success","result":{"accessToken":"abc","expiresIn":"7200","time":"2026-01-10 08:00:00"}}"#,
        )
        .unwrap();
        let token = env.into_result().unwrap().unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in.and_then(|s| s.as_i64()), Some(7200));
    }

    #[test]
    fn envelope_error_code_is_api_error() {
        let env: Envelope<Vec<WireDevice>> =
            serde_json::from_str(r#"{"code":"1001","message":"Illegal sign"}"#).unwrap();
        match env.into_result().unwrap_err() {
            TrackSolidError::Api { code, message } => {
                assert_eq!(code, 1001);
                assert_eq!(message, "Illegal sign");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn envelope_without_code_is_decode_error() {
        let env: Envelope<Vec<WireDevice>> = serde_json::from_str(r#"{"result":[]}"#).unwrap();
        assert!(matches!(env.into_result(), Err(TrackSolidError::Decode(_))));
    }

    #[test]
    fn device_defaults_to_enabled() {
        let dev: WireDevice = serde_json::from_str(r#"{"imei":860000000000001}"#).unwrap();
        let dev = dev.into_device().unwrap();
        assert_eq!(dev.imei, "860000000000001");
        assert!(dev.enabled);
        assert_eq!(dev.name, None);
    }

    #[test]
    fn device_without_imei_is_rejected() {
        let dev: WireDevice = serde_json::from_str(r#"{"deviceName":"ghost"}"#).unwrap();
        assert!(matches!(dev.into_device(), Err(TrackSolidError::Decode(_))));
    }

    #[test]
    fn point_uses_fallback_imei() {
        let point: WirePoint =
            serde_json::from_str(r#"{"lat":10,"lng":20,"gpsTime":"2026-01-10 12:00:00"}"#).unwrap();
        let loc = point.into_location(Some("IMEI9")).unwrap();
        assert_eq!(loc.imei, "IMEI9");
        assert_eq!((loc.latitude, loc.longitude), (10.0, 20.0));
    }

    #[test]
    fn point_with_bad_time_is_rejected() {
        let point: WirePoint =
            serde_json::from_str(r#"{"imei":"a","lat":10,"lng":20,"gpsTime":"yesterday"}"#).unwrap();
        let err = point.into_location(None).unwrap_err();
        assert!(err.to_string().contains("gpsTime"));
    }

    #[test]
    fn out_of_range_coordinates_are_left_to_validation() {
        let point: WirePoint =
            serde_json::from_str(r#"{"imei":"a","lat":"91","lng":"0","gpsTime":"2026-01-10 12:00:00"}"#)
                .unwrap();
        let loc = point.into_location(None).unwrap();
        assert!(!loc.has_valid_coordinates());
    }

    #[test]
    fn wire_time_accepts_rfc3339_too() {
        let a = parse_wire_time("2026-01-10 08:30:00").unwrap();
        let b = parse_wire_time("2026-01-10T08:30:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_wire_time("10/01/2026").is_none());
    }
}
