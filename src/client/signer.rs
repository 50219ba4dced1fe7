// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `SDK-HMAC-SHA256` request signing with an access key / secret key pair

use std::borrow::Cow;
use std::collections::BTreeMap;

use crypto::{digest::Digest, hmac::Hmac, mac::Mac, sha2::Sha256};
use reqwest::Url;
use time::OffsetDateTime;

use crate::utils::DisplayJoinable;

pub const ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const DATE_HEADER: &str = "x-sdk-date";
pub const AUTHORIZATION_HEADER: &str = "authorization";

pub struct Signer<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

impl<'a> Signer<'a> {
    /// Add `X-Sdk-Date` and `Authorization` to `headers`
    ///
    /// Header names in `headers` must be lowercase. All of them are signed, plus `host`.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &mut BTreeMap<String, String>,
        body: &[u8],
        now: OffsetDateTime,
    ) {
        headers.insert(DATE_HEADER.to_owned(), sdk_date(now));

        let mut signed = headers.clone();
        signed.insert("host".to_owned(), host(url));

        let canonical = canonical_request(method, url, &signed, body);
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{}",
            signed[DATE_HEADER],
            hex_sha256(canonical.as_bytes())
        );

        let mut mac = Hmac::new(Sha256::new(), self.secret_key.as_bytes());
        mac.input(string_to_sign.as_bytes());
        let signature = hex::encode(mac.result().code());

        headers.insert(
            AUTHORIZATION_HEADER.to_owned(),
            format!(
                "{ALGORITHM} Access={}, SignedHeaders={}, Signature={signature}",
                self.access_key,
                signed.keys().join_with(";"),
            ),
        );
    }
}

fn canonical_request(
    method: &str,
    url: &Url,
    headers: &BTreeMap<String, String>,
    body: &[u8],
) -> String {
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{}\n{}",
        canonical_uri(url),
        canonical_query(url),
        headers.keys().join_with(";"),
        hex_sha256(body),
    )
}

fn canonical_uri(url: &Url) -> String {
    let mut uri = url
        .path()
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));
            urlencoding::encode(&decoded).into_owned()
        })
        .join_with("/")
        .to_string();
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            (
                urlencoding::encode(&key).into_owned(),
                urlencoding::encode(&value).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .join_with("&")
        .to_string()
}

fn host(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_owned(),
        _ => String::new(),
    }
}

pub(crate) fn sdk_date(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn hex_sha256(data: &[u8]) -> String {
    let mut digest = Sha256::new();
    digest.input(data);
    digest.result_str()
}
