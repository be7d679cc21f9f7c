//! Integration tests for the compression filter.

#[cfg(feature = "zlib")]
mod zlib {
    use rand::Rng;
    use vigil_transport::{Connection, MemoryConnection, ZlibFilter};

    async fn drain<C: Connection>(conn: &C, len: usize) -> Vec<u8> {
        let mut got = Vec::new();
        while got.len() < len {
            got.extend(conn.recv().await.unwrap().unwrap());
        }
        got
    }

    #[tokio::test]
    async fn test_zlib_round_trip_through_filters() {
        let (a, b) = MemoryConnection::pair();
        let a = ZlibFilter::new(a, 6, 0);
        let b = ZlibFilter::new(b, 6, 0);

        let data = b"service_status ok ".repeat(100);
        a.send(&data).await.unwrap();
        assert_eq!(drain(&b, data.len()).await, data);
    }

    #[tokio::test]
    async fn test_zlib_compresses_on_the_wire() {
        let (a, raw) = MemoryConnection::pair();
        let a = ZlibFilter::new(a, 9, 0);

        let data = vec![b'a'; 10_000];
        a.send(&data).await.unwrap();

        let block = raw.recv().await.unwrap().unwrap();
        let len = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        assert_eq!(len as usize, block.len() - 4);
        assert!(block.len() < data.len() / 10);
        assert!(a.statistics().bytes_sent < 1_000);
    }

    #[tokio::test]
    async fn test_zlib_buffers_until_threshold_or_flush() {
        let (a, b) = MemoryConnection::pair();
        let a = ZlibFilter::new(a, 6, 1024);
        let b = ZlibFilter::new(b, 6, 1024);

        a.send(b"small").await.unwrap();
        assert_eq!(a.statistics().sends, 0);

        a.flush().await.unwrap();
        assert_eq!(a.statistics().sends, 1);
        assert_eq!(drain(&b, 5).await, b"small");
    }

    #[tokio::test]
    async fn test_zlib_reassembles_blocks_split_across_chunks() {
        let (a, raw_b) = MemoryConnection::pair();
        let a = ZlibFilter::new(a, 6, 0);
        let (relay_in, b) = MemoryConnection::pair();
        let b = ZlibFilter::new(b, 6, 0);

        let mut rng = rand::rng();
        let data: Vec<u8> = (0..20_000).map(|_| rng.random_range(0..4u8)).collect();
        a.send(&data).await.unwrap();
        a.close().await.unwrap();

        // Forward the compressed bytes one byte at a time.
        while let Some(chunk) = raw_b.recv().await.unwrap() {
            for byte in chunk {
                relay_in.send(&[byte]).await.unwrap();
            }
        }
        relay_in.close().await.unwrap();

        assert_eq!(drain(&b, data.len()).await, data);
        assert!(b.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zlib_passthrough_until_enabled() {
        let (a, b) = MemoryConnection::pair();
        let a = ZlibFilter::passthrough(a, 6, 0);
        let b = ZlibFilter::passthrough(b, 6, 0);
        assert!(!a.is_enabled());

        a.send(b"plain").await.unwrap();
        assert_eq!(b.recv().await.unwrap().unwrap(), b"plain");

        a.enable(Vec::new()).await;
        b.enable(Vec::new()).await;
        a.send(b"packed").await.unwrap();
        assert_eq!(drain(&b, 6).await, b"packed");
    }

    #[tokio::test]
    async fn test_zlib_enable_adopts_pending_bytes() {
        let (a, b) = MemoryConnection::pair();
        let a = ZlibFilter::new(a, 6, 0);
        a.send(b"first").await.unwrap();
        a.send(b"second").await.unwrap();

        // The reader already pulled the first block off the raw connection
        // before it knew compression was on.
        let early = b.recv().await.unwrap().unwrap();
        let b = ZlibFilter::passthrough(b, 6, 0);
        b.enable(early).await;

        assert_eq!(b.recv().await.unwrap().unwrap(), b"first");
        assert_eq!(b.recv().await.unwrap().unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_zlib_garbage_is_a_compression_error() {
        let (a, b) = MemoryConnection::pair();
        let b = ZlibFilter::new(b, 6, 0);
        a.send(&[0, 0, 0, 3, 9, 9, 9]).await.unwrap();
        let err = b.recv().await.unwrap_err();
        assert!(matches!(err, vigil_transport::TransportError::Compression(_)));
    }
}
