use std::collections::HashMap;

use branchbox::docker::{
    environment_label_filter, environment_labels, ContainerRuntime, ContainerSpec, DockerRuntime,
    PortMap,
};

const IMAGE: &str = "alpine:3.20";

fn spec(name: &str, host_port: u16) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        image: IMAGE.to_string(),
        mount: None,
        env: vec![("GREETING".to_string(), "hello".to_string())],
        labels: environment_labels(name),
        ports: vec![PortMap {
            container_port: 8080,
            host_port,
        }],
    }
}

#[tokio::test]
async fn container_lifecycle_against_docker() {
    let runtime = DockerRuntime::connect(1).unwrap();
    runtime.ping().await.unwrap();

    if !runtime.image_exists(IMAGE).await.unwrap() {
        runtime.pull(IMAGE).await.unwrap();
    }
    assert!(runtime.image_exists(IMAGE).await.unwrap());

    let name = format!("branchbox-it-{}", std::process::id());
    let host_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut spec = spec(&name, host_port);
    spec.labels.extend(HashMap::from([(
        "purpose".to_string(),
        "integration".to_string(),
    )]));
    let id = runtime.create(&spec).await.unwrap();

    runtime.start(&id).await.unwrap();
    let info = runtime.inspect(&id).await.unwrap();
    assert_eq!(info.id, id);
    assert!(info.running);

    let listed = runtime
        .list(&environment_label_filter(&name))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);

    runtime.stop(&id).await.unwrap();
    // Stopping twice is fine.
    runtime.stop(&id).await.unwrap();
    assert!(!runtime.inspect(&id).await.unwrap().running);

    runtime.remove(&id, true).await.unwrap();
    let err = runtime.inspect(&id).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
    assert!(runtime.remove(&id, true).await.unwrap_err().is_not_found());
}
