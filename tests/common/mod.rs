#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};

pub type Response = http::Response<Full<Bytes>>;

pub fn request(method: &str, path: &str) -> http::Request<Bytes> {
    request_with(method, path, &[], Bytes::new())
}

pub fn request_with(method: &str, path: &str, headers: &[(&str, &str)], body: Bytes) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body).unwrap()
}

pub fn body(resp: Response) -> Bytes {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async { resp.into_body().collect().await.unwrap().to_bytes() })
}

pub fn text(resp: Response) -> String {
    String::from_utf8(body(resp).to_vec()).unwrap()
}

pub fn header<'a>(resp: &'a Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}
