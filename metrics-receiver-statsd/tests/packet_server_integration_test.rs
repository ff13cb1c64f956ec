#[cfg(all(test, feature = "test-util"))]
mod packet_server_test {
    use std::{
        collections::HashSet,
        sync::Arc,
        thread::{self, JoinHandle},
        time::Duration,
    };

    use crossbeam_channel::{bounded, Receiver};
    use metrics_receiver_statsd::{
        test_util::{temporary_socket_path, StatsDTestClient, TestMetric},
        Error, Metric, PacketServer, TracingReporter, Transport,
    };

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn serve(server: &Arc<PacketServer>, capacity: usize) -> (Receiver<Metric>, JoinHandle<Result<(), Error>>) {
        let (tx, rx) = bounded(capacity);
        let server = Arc::clone(server);
        let handle = thread::spawn(move || {
            let consumer = |_: Metric| {};
            server.listen_and_serve(Some(&consumer), Some(&TracingReporter), &tx)
        });

        (rx, handle)
    }

    fn shutdown(server: &PacketServer, handle: JoinHandle<Result<(), Error>>) {
        server.close().unwrap_or_else(|e| panic!("failed to close server: {e}"));
        let result = handle.join().unwrap_or_else(|_| panic!("serve thread panicked"));
        assert!(matches!(result, Err(Error::Closed)), "unexpected serve result: {result:?}");
    }

    #[test]
    fn test_udp_metrics_in_order() {
        init_tracing();

        let server = Arc::new(PacketServer::new(Transport::Udp, "127.0.0.1:0").unwrap());
        let address = server.local_addr().to_string();
        let (rx, handle) = serve(&server, 64);

        let client = StatsDTestClient::new("udp", &address).unwrap();
        let sender = client.local_addr().unwrap();

        let metrics = (0..20)
            .map(|i| TestMetric::new(format!("test.metric.{i}"), i.to_string(), "c"))
            .collect::<Vec<_>>();
        for metric in &metrics {
            client.send_metric(metric).unwrap();
        }

        for expected in &metrics {
            let received = rx.recv_timeout(RECV_TIMEOUT).unwrap();
            assert_eq!(received.line, expected.to_string());
            assert_eq!(received.addr, sender);
        }

        shutdown(&server, handle);
    }

    #[test]
    fn test_udp_batched_datagram() {
        init_tracing();

        let server = Arc::new(
            PacketServer::builder()
                .with_transport_name("udp4")
                .unwrap()
                .with_listen_address("127.0.0.1:0")
                .build()
                .unwrap(),
        );
        let address = server.local_addr().to_string();
        let (rx, handle) = serve(&server, 8);

        let client = StatsDTestClient::new("udp4", &address).unwrap();
        client.send_raw(b"  a:1|c\r\n\n b:2|g|#env:test\nc:3|ms").unwrap();

        let lines = (0..3).map(|_| rx.recv_timeout(RECV_TIMEOUT).unwrap().line).collect::<Vec<_>>();
        assert_eq!(lines, vec!["a:1|c", "b:2|g|#env:test", "c:3|ms"]);

        shutdown(&server, handle);
    }

    #[test]
    fn test_backpressure_does_not_drop_lines() {
        init_tracing();

        let server = Arc::new(PacketServer::new(Transport::Udp, "127.0.0.1:0").unwrap());
        let address = server.local_addr().to_string();

        // A channel of one forces the server to wait on every line.
        let (rx, handle) = serve(&server, 1);

        let client = StatsDTestClient::new("udp", &address).unwrap();
        let payload = (0..50).map(|i| format!("line.{i}:1|c")).collect::<Vec<_>>().join("\n");
        client.send_raw(payload.as_bytes()).unwrap();

        thread::sleep(Duration::from_millis(50));

        let received = (0..50).map(|_| rx.recv_timeout(RECV_TIMEOUT).unwrap().line).collect::<Vec<_>>();
        let expected = (0..50).map(|i| format!("line.{i}:1|c")).collect::<Vec<_>>();
        assert_eq!(received, expected);

        shutdown(&server, handle);
    }

    #[test]
    fn test_multiple_servers() {
        init_tracing();

        let first = Arc::new(PacketServer::new(Transport::Udp, "127.0.0.1:0").unwrap());
        let second = Arc::new(PacketServer::new(Transport::Udp, "127.0.0.1:0").unwrap());
        let (first_rx, first_handle) = serve(&first, 8);
        let (second_rx, second_handle) = serve(&second, 8);

        StatsDTestClient::new("udp", &first.local_addr().to_string())
            .unwrap()
            .send_metric(&TestMetric::new("first", "1", "c"))
            .unwrap();
        StatsDTestClient::new("udp", &second.local_addr().to_string())
            .unwrap()
            .send_metric(&TestMetric::new("second", "2", "g"))
            .unwrap();

        let lines = [
            first_rx.recv_timeout(RECV_TIMEOUT).unwrap().line,
            second_rx.recv_timeout(RECV_TIMEOUT).unwrap().line,
        ]
        .into_iter()
        .collect::<HashSet<_>>();
        assert_eq!(lines, HashSet::from(["first:1|c".to_string(), "second:2|g".to_string()]));

        shutdown(&first, first_handle);
        shutdown(&second, second_handle);
    }

    #[cfg(unix)]
    #[test]
    fn test_unixgram_lifecycle() {
        init_tracing();

        let path = temporary_socket_path();
        let address = path.to_string_lossy().into_owned();

        // A leftover socket file from a previous run must not prevent binding.
        let stale = PacketServer::new(Transport::Unixgram, address.clone()).unwrap();
        drop(stale);
        assert!(path.exists());

        let server = Arc::new(PacketServer::new(Transport::Unixgram, address.clone()).unwrap());
        let (rx, handle) = serve(&server, 8);

        let client = StatsDTestClient::new("unixgram", &address).unwrap();
        client.send_metric(&TestMetric::new("uds.counter", "3", "c")).unwrap();

        let metric = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(metric.line, "uds.counter:3|c");
        assert_eq!(metric.addr.to_string(), "UDS");
        assert_eq!(metric.addr.network(), "unixgram");

        shutdown(&server, handle);
        assert!(!path.exists());
        server.close().unwrap();
    }
}
