use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use refgenome_fetch::decompress;
use refgenome_fetch::domain::Resource;
use refgenome_fetch::error::GenomeError;
use refgenome_fetch::fetch::{Fetcher, is_remote};
use refgenome_fetch::progress::NoProgress;
use refgenome_fetch::staging::Staging;
use refgenome_fetch::transport::{HttpTransport, RemoteBody, Transport};

/// Serves `delivered` bytes while declaring `declared` as the length.
struct ShortTransport {
    declared: Option<u64>,
    delivered: usize,
    calls: Mutex<usize>,
}

impl ShortTransport {
    fn new(declared: Option<u64>, delivered: usize) -> Self {
        Self {
            declared,
            delivered,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Transport for ShortTransport {
    fn open(&self, _resource: &Resource) -> Result<RemoteBody, GenomeError> {
        *self.calls.lock().unwrap() += 1;
        Ok(RemoteBody {
            total: self.declared,
            reader: Box::new(Cursor::new(vec![b'N'; self.delivered])),
        })
    }
}

const URL: &str = "http://hgdownload.example/goldenPath/hg19/bigZips/hg19.chrom.sizes";

#[test]
fn short_transfer_fails_when_strict() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());
    let transport = ShortTransport::new(Some(1000), 800);
    let fetcher = Fetcher::new(&transport, &staging, true);

    let err = fetcher.fetch(&Resource::new(URL), &NoProgress).unwrap_err();
    assert_matches!(
        err,
        GenomeError::TransferIncomplete {
            expected: 1000,
            received: 800
        }
    );
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn short_transfer_is_flagged_when_lenient() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());

    let short = ShortTransport::new(Some(1000), 800);
    let fetched = Fetcher::new(&short, &staging, false)
        .fetch(&Resource::new(URL), &NoProgress)
        .unwrap();
    assert!(fetched.is_incomplete());
    assert_eq!(fetched.received, 800);
    assert_eq!(fetched.file.len().unwrap(), 800);

    let complete = ShortTransport::new(Some(1000), 1000);
    let fetched = Fetcher::new(&complete, &staging, false)
        .fetch(&Resource::new(URL), &NoProgress)
        .unwrap();
    assert!(!fetched.is_incomplete());
    assert_eq!(fetched.received, 1000);
}

#[test]
fn undeclared_length_is_never_incomplete() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());
    let transport = ShortTransport::new(None, 300);

    let fetched = Fetcher::new(&transport, &staging, true)
        .fetch(&Resource::new(URL), &NoProgress)
        .unwrap();
    assert!(!fetched.is_incomplete());
    assert_eq!(fetched.received, 300);
}

#[test]
fn local_paths_are_copied_without_transport() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path().join("staging"));
    let source = temp.path().join("hg19.chrom.sizes");
    fs::write(&source, "chr1\t249250621\nchr2\t243199373\n").unwrap();
    let transport = ShortTransport::new(Some(1), 1);

    let fetched = Fetcher::new(&transport, &staging, true)
        .fetch(&Resource::new(source.to_str().unwrap()), &NoProgress)
        .unwrap();

    assert_eq!(transport.calls(), 0);
    assert_eq!(
        fs::read_to_string(fetched.file.path()).unwrap(),
        "chr1\t249250621\nchr2\t243199373\n"
    );
    assert!(source.exists());
}

#[test]
fn scheme_detection() {
    assert!(is_remote("http://hgdownload.cse.ucsc.edu/goldenPath"));
    assert!(is_remote("HTTPS://genome.ucsc.edu/cgi-bin/hgTables"));
    assert!(is_remote("ftp://ftp.ensembl.org/pub"));
    assert!(!is_remote("/data/hg19.fa"));
    assert!(!is_remote("data/http://nested"));
}

#[test]
fn gzip_payload_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());
    let plain = b"chr1\t0\t2300000\tp36.33\tgneg\nchr1\t2300000\t5400000\tp36.32\tgpos25\n";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(plain).unwrap();
    let compressed = encoder.finish().unwrap();
    let source = temp.path().join("cytoBand.txt.gz");
    fs::write(&source, &compressed).unwrap();
    let transport = ShortTransport::new(None, 0);

    let fetched = Fetcher::new(&transport, &staging, true)
        .fetch(&Resource::gzip(source.to_str().unwrap()), &NoProgress)
        .unwrap();
    let decompressed = decompress::decompress(fetched.file, &staging).unwrap();

    assert_eq!(fs::read(decompressed.path()).unwrap(), plain);
}

/// Answers one request with a declared `Content-Length` but closes after `delivered` bytes.
fn serve_truncated(declared: usize, delivered: usize) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!(
        "http://{}/goldenPath/hg19/bigZips/hg19.chrom.sizes",
        listener.local_addr().unwrap()
    );
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(&vec![b'N'; delivered]).unwrap();
        stream.flush().unwrap();
    });
    (url, server)
}

#[test]
fn truncated_http_body_fails_when_strict() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let (url, server) = serve_truncated(1000, 800);

    let err = Fetcher::new(&transport, &staging, true)
        .fetch(&Resource::new(url), &NoProgress)
        .unwrap_err();
    server.join().unwrap();

    assert_matches!(
        err,
        GenomeError::TransferIncomplete {
            expected: 1000,
            received: 800
        }
    );
}

#[test]
fn truncated_http_body_is_kept_when_lenient() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let (url, server) = serve_truncated(1000, 800);

    let fetched = Fetcher::new(&transport, &staging, false)
        .fetch(&Resource::new(url), &NoProgress)
        .unwrap();
    server.join().unwrap();

    assert!(fetched.is_incomplete());
    assert_eq!((fetched.received, fetched.expected), (800, Some(1000)));
    assert_eq!(fetched.file.len().unwrap(), 800);
}

/// Delivers `good` bytes, then fails the read the way a dropped connection does.
struct ResetBody {
    good: usize,
}

impl Read for ResetBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.good == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        let n = self.good.min(buf.len());
        buf[..n].fill(b'N');
        self.good -= n;
        Ok(n)
    }
}

struct ResetTransport {
    declared: Option<u64>,
}

impl Transport for ResetTransport {
    fn open(&self, _resource: &Resource) -> Result<RemoteBody, GenomeError> {
        Ok(RemoteBody {
            total: self.declared,
            reader: Box::new(ResetBody { good: 800 }),
        })
    }
}

#[test]
fn read_error_without_declared_length_is_a_transfer_error() {
    let temp = tempfile::tempdir().unwrap();
    let staging = Staging::new(temp.path());

    let err = Fetcher::new(&ResetTransport { declared: None }, &staging, false)
        .fetch(&Resource::new(URL), &NoProgress)
        .unwrap_err();
    assert_matches!(err, GenomeError::Http(_));

    let fetched = Fetcher::new(&ResetTransport { declared: Some(1000) }, &staging, false)
        .fetch(&Resource::new(URL), &NoProgress)
        .unwrap();
    assert_eq!(fetched.received, 800);
    assert!(fetched.is_incomplete());
}
