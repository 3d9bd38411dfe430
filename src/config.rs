use std::{
    env,
    net::{IpAddr, SocketAddr},
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Runtime settings, read once at startup. The bind address defaults to
/// the whole LAN so the till UI can reach the API from another device.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let host = env::var("BIND_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var("BIND_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("BIND_PORT must be a port number, got {raw:?}"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            bind_addr: bind_addr(&host, port)?,
        })
    }
}

fn bind_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| anyhow::anyhow!("BIND_HOST must be an IP address, got {host:?}"))?;
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_accepts_v4_and_v6() {
        assert_eq!(bind_addr("0.0.0.0", 8080).unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(bind_addr("::1", 9000).unwrap().to_string(), "[::1]:9000");
    }

    #[test]
    fn bind_addr_rejects_hostnames() {
        assert!(bind_addr("localhost", 8080).is_err());
    }
}
