//! Inbound envelope vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use cloudlink_core::protocol::{Envelope, EnvelopeWriter};

mod vector_loader;
use vector_loader::load;

#[test]
fn envelope_vectors() {
    let files = [
        "command_min.json",
        "ack_full.json",
        "ack_float_time.json",
        "missing_cmd.json",
        "cmd_too_long.json",
        "not_json.json",
        "zero_req_id.json",
    ];

    for f in files {
        let v = load(f);
        let res = Envelope::parse(&v.raw);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(env.cmd, ex["cmd"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(
            env.req_id.map(u64::from),
            ex["req_id"].as_u64(),
            "vector={}",
            v.description
        );
        assert_eq!(
            env.src_cmd.as_deref(),
            ex["src_cmd"].as_str(),
            "vector={}",
            v.description
        );
        assert_eq!(
            env.fields.len() as u64,
            ex["field_count"].as_u64().unwrap(),
            "vector={}",
            v.description
        );
    }
}

#[test]
fn built_command_parses_back() {
    let mut w = EnvelopeWriter::command("loc", 1234, 1_700_000_000, 1024).unwrap();
    w.insert("lat", 45.5).unwrap();
    w.insert("tags", vec!["gps", "fix"]).unwrap();

    let env = Envelope::parse(&w.finish().unwrap()).unwrap();
    assert_eq!(env.cmd, "loc");
    assert_eq!(env.req_id, Some(1234));
    assert_eq!(env.time, Some(1_700_000_000));
    assert_eq!(env.get("lat").and_then(|v| v.as_f64()), Some(45.5));
    assert_eq!(env.get("tags").unwrap()[1], "fix");
    assert!(env.src_cmd.is_none());
}

#[test]
fn typed_payload_decode() {
    #[derive(serde::Deserialize)]
    struct CfgReq {
        interval: u32,
    }

    let env = Envelope::parse(r#"{"cmd":"cfg","req_id":3,"interval":60}"#).unwrap();
    let req: CfgReq = env.payload().unwrap();
    assert_eq!(req.interval, 60);

    let bad = Envelope::parse(r#"{"cmd":"cfg","req_id":3,"interval":"soon"}"#).unwrap();
    assert_eq!(bad.payload::<CfgReq>().err().unwrap().code().as_str(), "PARSE");
}
