use tonic_build::manual::{Builder, Method, Service};

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{}", input))
        .output_type(format!("crate::proto::{}", output))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Messages are prost derives in src/proto/mod.rs; only the service stubs are generated here,
    // which keeps protoc out of the build.
    println!("cargo:rerun-if-changed=build.rs");

    let context_update = Service::builder()
        .name("Contextupdate")
        .package("contextupdate")
        .method(method(
            "update_app_context",
            "UpdateAppContext",
            "ContextUpdateRequest",
            "ContextUpdateResponse",
        ))
        .method(method(
            "terminate_app_context",
            "TerminateAppContext",
            "TerminateRequest",
            "TerminateResponse",
        ))
        .method(method(
            "post_event",
            "PostEvent",
            "PostEventRequest",
            "PostEventResponse",
        ))
        .build();

    let placement = Service::builder()
        .name("PlacementController")
        .package("placementcontroller")
        .method(method(
            "filter_clusters",
            "FilterClusters",
            "ResourceRequest",
            "ResourceResponse",
        ))
        .build();

    Builder::new()
        .build_server(true)
        .build_client(true)
        .compile(&[context_update, placement]);
    Ok(())
}
