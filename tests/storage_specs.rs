extern crate xylem;

#[cfg(test)]
mod storage_spec {
    use std::sync::Arc;

    use xylem::element::{ElementKind, ScalarKind};
    use xylem::prelude::*;

    fn fixture(count: usize) -> Tensor<f32> {
        let data = (0..count).map(|i| i as f32).collect();
        Tensor::<f32>::vector(data).unwrap()
    }

    /// The first emulated island has a peer pair of discrete devices.
    fn island_pair() -> (Arc<Device>, Arc<Device>) {
        let service = Platform::global().service_named("emulated").unwrap();
        (service.devices()[0].clone(), service.devices()[1].clone())
    }

    #[test]
    fn it_serves_zeroed_replicas_before_the_first_write() {
        let stream = Platform::global().host_device().stream().unwrap();
        let storage = Storage::empty(ElementKind::Scalar(ScalarKind::F32), 4);

        assert_eq!(storage.master_key(), None);
        let buffer = storage.read(&stream).unwrap();
        stream.block_until_idle().unwrap();

        assert!(unsafe { buffer.as_slice::<f32>() }.iter().all(|&v| v == 0.0));
        assert_eq!(buffer.version(), -1);
        assert_eq!(storage.master_key(), None);
    }

    #[test]
    fn it_increments_the_master_version_by_one_per_mutating_access() {
        let stream = Platform::global().host_device().stream().unwrap();
        let tensor = fixture(8);
        let storage = tensor.storage();

        assert_eq!(storage.master_version(), 0);
        storage.read_write(&stream).unwrap();
        assert_eq!(storage.master_version(), 1);
        storage.read_write(&stream).unwrap();
        assert_eq!(storage.master_version(), 2);
        storage.write_only(&stream).unwrap();
        assert_eq!(storage.master_version(), 3);
        storage.read(&stream).unwrap();
        assert_eq!(storage.master_version(), 3);
    }

    #[test]
    fn it_refuses_to_mutate_a_read_only_reference() {
        let stream = Platform::global().host_device().stream().unwrap();
        let mut tensor = Tensor::<f32>::read_only_from(3usize, vec![1.0, 2.0, 3.0]).unwrap();

        let violation = tensor.read_write(&stream).unwrap_err();
        assert_eq!(violation.kind(), ErrorKind::ReadOnlyViolation);
        assert_eq!(tensor.value(&[1]).unwrap(), 2.0);
    }

    #[test]
    fn it_walks_the_migration_routes_between_host_and_a_device_pair() {
        // A (2, 3, 4) tensor filled [0..24) on the host, chased across two devices.
        let host = Platform::global().host_device();
        let (d1, d2) = island_pair();
        let host_stream = host.stream().unwrap();
        let s1 = d1.stream().unwrap();
        let s2 = d2.stream().unwrap();

        let data: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let tensor = Tensor::<f32>::volume(2, 3, 4, data.clone()).unwrap();
        let storage = tensor.storage();

        // Host reads of the host master never copy.
        storage.read(&host_stream).unwrap();
        assert!(!storage.last_access_copied());
        storage.read(&host_stream).unwrap();
        assert!(!storage.last_access_copied());

        // First device read allocates and copies.
        storage.read(&s1).unwrap();
        assert!(storage.last_access_copied());
        assert_eq!(storage.replica_version(d1.key()), Some(0));

        storage.read(&host_stream).unwrap();
        assert!(!storage.last_access_copied());

        // The replica is current, so promotion to master copies nothing.
        storage.read_write(&s1).unwrap();
        assert!(!storage.last_access_copied());
        assert_eq!(storage.master_key(), Some(d1.key()));
        assert_eq!(storage.master_version(), 1);

        storage.read(&s2).unwrap();
        assert!(storage.last_access_copied());
        assert_eq!(storage.replica_version(d2.key()), Some(1));

        storage.read_write(&s1).unwrap();
        assert!(!storage.last_access_copied());
        assert_eq!(storage.master_version(), 2);

        storage.read(&s2).unwrap();
        assert!(storage.last_access_copied());

        storage.read_write(&s2).unwrap();
        assert!(!storage.last_access_copied());
        assert_eq!(storage.master_key(), Some(d2.key()));

        storage.read_write(&s1).unwrap();
        assert!(storage.last_access_copied());
        assert_eq!(storage.master_key(), Some(d1.key()));

        storage.read_write(&s2).unwrap();
        assert!(storage.last_access_copied());
        assert_eq!(storage.master_version(), 5);

        // Exactly one replica carries the master version.
        let versions = [
            storage.replica_version(host.key()).unwrap(),
            storage.replica_version(d1.key()).unwrap(),
            storage.replica_version(d2.key()).unwrap(),
        ];
        assert_eq!(versions.iter().filter(|&&v| v == 5).count(), 1);

        // The blocking host fetch stages the device master back.
        let fetched = storage.read_host().unwrap();
        assert!(storage.last_access_copied());
        assert_eq!(unsafe { fetched.as_slice::<f32>() }, &data[..]);
        assert_eq!(storage.replica_version(host.key()), Some(5));
    }

    #[test]
    fn it_stages_through_the_host_between_services() {
        let services = Platform::global().services();
        assert!(services.len() >= 3, "the emulated islands must be enumerated");

        let d1 = services[1].devices()[0].clone();
        let d3 = services[2].devices()[0].clone();
        assert_ne!(d1.service_id(), d3.service_id());

        let s1 = d1.stream().unwrap();
        let s3 = d3.stream().unwrap();

        let mut tensor = fixture(16);
        let buffer = tensor.read_write(&s1).unwrap();
        {
            let buffer = buffer.clone();
            s1.enqueue(move || {
                for value in unsafe { buffer.as_mut_slice::<f32>() } {
                    *value += 100.0;
                }
                Ok(())
            }).unwrap();
        }

        // Reading on the other island stages master -> host -> target.
        let remote = tensor.storage().read(&s3).unwrap();
        assert!(tensor.storage().last_access_copied());
        s3.block_until_idle().unwrap();

        let seen = unsafe { remote.as_slice::<f32>() };
        let expected: Vec<f32> = (0..16).map(|i| i as f32 + 100.0).collect();
        assert_eq!(seen, &expected[..]);

        // The staging host replica was brought current too.
        let host = Platform::global().host_device();
        assert_eq!(
            tensor.storage().replica_version(host.key()),
            Some(tensor.storage().master_version()));
    }

    #[test]
    fn it_gates_cross_stream_readers_on_the_write_completion() {
        let host = Platform::global().host_device();
        let (d1, _) = island_pair();
        let a = host.stream().unwrap();
        let b = d1.stream().unwrap();

        let mut tensor = Tensor::<f32>::zeroed(32usize).unwrap();
        let buffer = tensor.write_only(&a).unwrap();
        {
            let buffer = buffer.clone();
            a.enqueue(move || {
                std::thread::sleep(std::time::Duration::from_millis(30));
                for value in unsafe { buffer.as_mut_slice::<f32>() } {
                    *value = 7.0;
                }
                Ok(())
            }).unwrap();
        }

        // The read on `b` resolves against the completion of the write on `a`, including the
        // kernel queued after the access itself.
        let values: Vec<f32> = tensor.values(&b).unwrap().collect();
        assert!(values.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn it_aliases_the_host_region_for_unified_peers() {
        let host = Platform::global().host_device();
        let stream = host.stream().unwrap();
        let tensor = fixture(8);

        let first = tensor.storage().read(&stream).unwrap();
        let again = tensor.storage().read(&stream).unwrap();
        assert!(first.shares_region_with(&again));
    }
}
