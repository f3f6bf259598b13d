use std::{fs, io, path::Path, sync::Arc};

use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    ServerConfig,
};
use tokio::net::TcpStream;
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tokio_util::either::Either;

pub type Certs = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

/// Builds the listener's TLS acceptor, media elements only speak http/1.1 to us.
pub fn acceptor((certs, key): Certs) -> Result<TlsAcceptor, rustls::Error> {
    // Set a process wide default crypto provider.
    #[cfg(feature = "ring")]
    let _ = rustls::crypto::ring::default_provider().install_default();
    #[cfg(feature = "aws-lc-rs")]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec(), b"http/1.0".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

pub fn load_certs(certs: &Path, private_key: &Path) -> io::Result<Certs> {
    Ok((load_public_certs(certs)?, load_private_key(private_key)?))
}

// Load public certificate chain from a pem file.
fn load_public_certs(filename: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    let mut reader = io::BufReader::new(fs::File::open(filename)?);
    rustls_pemfile::certs(&mut reader).collect()
}

// Load the first private key from a pem file.
fn load_private_key(filename: &Path) -> io::Result<PrivateKeyDer<'static>> {
    let mut reader = io::BufReader::new(fs::File::open(filename)?);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no private key found in {}", filename.display()),
        )
    })
}

/// An accepted connection, with or without TLS on top.
pub type MaybeTls = Either<TlsStream<TcpStream>, TcpStream>;

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("relayd-{}-{name}", std::process::id()));
        fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn missing_private_key_is_an_error() {
        let path = write_temp("empty.pem", "");
        let err = load_private_key(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("relayd-does-not-exist.pem");
        assert!(load_certs(&path, &path).is_err());
    }

    #[tokio::test]
    async fn plain_connections_pass_bytes_through() {
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpListener,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut conn: MaybeTls = Either::Right(stream);
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        conn.write_all(b"pong").await.unwrap();

        assert_eq!(&client.await.unwrap(), b"pong");
    }
}
