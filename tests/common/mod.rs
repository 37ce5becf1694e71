use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tiny_http::{Response, Server};

use iot_temp_sim::config::DeviceConfig;

/// Local endpoint answering every request with a fixed status code,
/// counting the requests it saw and capturing the last request's headers.
pub struct StatusEndpoint {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    headers: Arc<Mutex<Vec<(String, String)>>>,
    server: Arc<Server>,
}

impl StatusEndpoint {
    pub fn start(status: u16) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fixture server"));
        let port = server
            .server_addr()
            .to_ip()
            .expect("fixture listens on tcp")
            .port();
        let hits = Arc::new(AtomicUsize::new(0));
        let headers = Arc::new(Mutex::new(Vec::new()));

        let loop_server = server.clone();
        let loop_hits = hits.clone();
        let loop_headers = headers.clone();
        std::thread::spawn(move || {
            for request in loop_server.incoming_requests() {
                loop_hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let captured: Vec<(String, String)> = request
                    .headers()
                    .iter()
                    .map(|header| {
                        (
                            header.field.as_str().as_str().to_ascii_lowercase(),
                            header.value.as_str().to_string(),
                        )
                    })
                    .collect();
                *loop_headers.lock().expect("fixture header lock") = captured;
                let _ = request.respond(Response::from_string("{}").with_status_code(status));
            }
        });

        StatusEndpoint {
            url: format!("http://127.0.0.1:{}/webhook", port),
            hits,
            headers,
            server,
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Value of a header on the most recent request, by case-insensitive
    /// name.
    pub fn header(&self, name: &str) -> Option<String> {
        let wanted = name.to_ascii_lowercase();
        self.headers
            .lock()
            .expect("fixture header lock")
            .iter()
            .find(|(field, _)| *field == wanted)
            .map(|(_, value)| value.clone())
    }
}

impl Drop for StatusEndpoint {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// Device config with millisecond pacing so tests run fast.
pub fn fast_config(url: &str) -> DeviceConfig {
    DeviceConfig {
        webhook_url: url.to_string(),
        device_id: "device-test".to_string(),
        min_temp: 18.0,
        max_temp: 32.0,
        interval: Duration::from_millis(10),
        max_retries: 3,
        retry_delay: Duration::from_millis(50),
        request_timeout: Duration::from_secs(2),
        max_consecutive_failures: 5,
        cooldown: Duration::from_secs(30),
    }
}

/// An address nothing is listening on: bind an ephemeral port, then drop
/// the listener.
pub fn dead_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind throwaway listener");
    let port = listener.local_addr().expect("throwaway listener addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/webhook", port)
}
