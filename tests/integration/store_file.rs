use std::path::Path;

use branchbox::store::model::EnvironmentStatus;
use branchbox::store::Store;

use crate::common::TestHome;

#[test]
fn state_survives_reopening_the_database() {
    let home = TestHome::new();
    let path = home.database_path();

    {
        let store = Store::open(&path).unwrap();
        let project = store.ensure_project("demo", Path::new("/repos/demo")).unwrap();
        let env = store
            .insert_environment(project.id, "demo-main", "main")
            .unwrap();
        store
            .allocate_port_mapping(env.id, 3000, "demo-main.localhost", 49200)
            .unwrap();
        store
            .update_environment_status(env.id, EnvironmentStatus::Stopped)
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    let records = store.list_environments(None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].environment.status, EnvironmentStatus::Stopped);
    assert_eq!(records[0].ports[0].host_port, 49200);
    assert_eq!(store.next_host_port(49200).unwrap(), 49201);
}

#[test]
fn two_handles_on_one_file_never_share_a_port() {
    let home = TestHome::new();
    let path = home.database_path();

    let a = Store::open(&path).unwrap();
    let b = Store::open(&path).unwrap();
    let project = a.ensure_project("demo", Path::new("/repos/demo")).unwrap();
    let env = a.insert_environment(project.id, "demo-main", "main").unwrap();

    let handles: Vec<_> = [a, b]
        .into_iter()
        .enumerate()
        .map(|(i, store)| {
            let env_id = env.id;
            std::thread::spawn(move || {
                (0..5)
                    .map(|n| {
                        store
                            .allocate_port_mapping(
                                env_id,
                                4000 + (i * 10 + n) as u16,
                                &format!("h{i}-{n}.localhost"),
                                49200,
                            )
                            .unwrap()
                            .host_port
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ports: Vec<u16> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ports.sort_unstable();
    assert_eq!(ports, (49200..49210).collect::<Vec<_>>());
}
