extern crate xylem;

#[cfg(test)]
mod stream_spec {
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use xylem::prelude::*;

    fn host_stream() -> Stream {
        Platform::global().host_device().stream().unwrap()
    }

    #[test]
    fn it_executes_closures_in_submission_order() {
        let stream = host_stream();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let order = order.clone();
            stream.enqueue(move || {
                order.lock().unwrap().push(i);
                Ok(())
            }).unwrap();
        }

        stream.block_until_idle().unwrap();
        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn it_signals_a_recorded_event_after_earlier_work() {
        let stream = host_stream();
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let ran = ran.clone();
            stream.enqueue(move || {
                thread::sleep(Duration::from_millis(20));
                ran.store(1, Ordering::SeqCst);
                Ok(())
            }).unwrap();
        }

        let event = stream.create_event();
        stream.record(&event).unwrap();
        event.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn it_resets_an_already_signaled_event_on_record() {
        let stream = host_stream();
        let event = stream.create_event();

        stream.record(&event).unwrap();
        event.wait(None).unwrap();
        assert!(event.occurred());

        stream.record(&event).unwrap();
        event.wait(None).unwrap();
        assert!(event.occurred());
    }

    #[test]
    fn it_orders_work_across_streams_with_sync_with() {
        // fill(t, 1); add(t, 2) -> u on stream A; stream B reads u after an event edge.
        let device = Platform::global().host_device();
        let a = device.stream().unwrap();
        let b = device.stream().unwrap();

        let mut t = Tensor::<f32>::zeroed(64usize).unwrap();
        let mut u = Tensor::<f32>::zeroed(64usize).unwrap();

        let t_buffer = t.write_only(&a).unwrap();
        {
            let t_buffer = t_buffer.clone();
            a.enqueue(move || {
                thread::sleep(Duration::from_millis(20));
                for value in unsafe { t_buffer.as_mut_slice::<f32>() } {
                    *value = 1.0;
                }
                Ok(())
            }).unwrap();
        }

        let u_buffer = u.write_only(&a).unwrap();
        {
            let t_buffer = t_buffer.clone();
            let u_buffer = u_buffer.clone();
            a.enqueue(move || {
                let source = unsafe { t_buffer.as_slice::<f32>() };
                let destination = unsafe { u_buffer.as_mut_slice::<f32>() };
                for (d, s) in destination.iter_mut().zip(source) {
                    *d = s + 2.0;
                }
                Ok(())
            }).unwrap();
        }

        let edge = b.create_event();
        b.sync_with(&a, &edge).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            let u_buffer = u_buffer.clone();
            b.enqueue(move || {
                seen.lock().unwrap().extend_from_slice(unsafe { u_buffer.as_slice::<f32>() });
                Ok(())
            }).unwrap();
        }

        b.block_until_idle().unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 64);
        assert!(seen.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn it_skips_later_work_once_poisoned() {
        let stream = host_stream();
        let ran = Arc::new(AtomicUsize::new(0));

        stream.inject_failure().unwrap();
        {
            let ran = ran.clone();
            stream.enqueue(move || {
                ran.store(1, Ordering::SeqCst);
                Ok(())
            }).unwrap();
        }

        let joined = stream.block_until_idle();
        assert!(joined.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(stream.last_error_kind(), Some(ErrorKind::Other));
    }

    #[test]
    fn it_surfaces_the_failure_through_events_recorded_after_poisoning() {
        let stream = host_stream();
        stream.inject_failure().unwrap();

        let event = stream.create_event();
        stream.record(&event).unwrap();
        let waited = event.wait(Some(Duration::from_secs(5)));
        assert_eq!(waited.unwrap_err().kind(), ErrorKind::Other);
    }

    #[test]
    fn it_measures_elapsed_time_between_events() {
        let stream = host_stream();
        let first = stream.create_event();
        let second = stream.create_event();

        stream.record(&first).unwrap();
        stream.enqueue(|| {
            thread::sleep(Duration::from_millis(15));
            Ok(())
        }).unwrap();
        stream.record(&second).unwrap();
        stream.block_until_idle().unwrap();

        let elapsed = second.elapsed_since(&first).unwrap();
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn it_runs_synchronously_when_asked() {
        let stream = host_stream();
        stream.set_synchronous(true);

        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = ran.clone();
            stream.enqueue(move || {
                ran.store(7, Ordering::SeqCst);
                Ok(())
            }).unwrap();
        }
        // No join: synchronous submission already executed the closure.
        assert_eq!(ran.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn it_times_out_waiting_for_an_unrecorded_event() {
        let event = Event::new();
        let waited = event.wait(Some(Duration::from_millis(10)));
        assert_eq!(waited.unwrap_err().kind(), ErrorKind::TimedOut);
    }
}
