//! Generated protobuf wire types for `proto/iot/iot.proto`.

include!(concat!(env!("OUT_DIR"), "/iot.rs"));
