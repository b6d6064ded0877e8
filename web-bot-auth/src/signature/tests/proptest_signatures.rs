use std::sync::Arc;

use ed25519_dalek::SigningKey;
use proptest::prelude::*;
use reqwest::{Method, Request};

use crate::{
    keys::{InMemoryKeyResolver, Jwk, public_identifier},
    signature::{MessageSigner, MessageVerifier, SignOptions, reconstruct_signature_base},
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_signature_verification_roundtrip(
        seed in any::<[u8; 32]>(),
        method in "GET|POST|PUT|DELETE",
        authority in "[a-z0-9]{1,20}\\.com",
        path in "/[a-z0-9/]{0,30}",
        agent in proptest::option::of("[a-z0-9]{1,20}\\.example"),
        created in 0u64..4_000_000_000,
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        let mut resolver = InMemoryKeyResolver::new();
        let key_id = resolver.add(signing_key);
        let signer = MessageSigner::new(Arc::new(resolver));

        let url = format!("https://{authority}{path}").parse().unwrap();
        let mut request = Request::new(method.parse::<Method>().unwrap(), url);
        let mut options = SignOptions::new(key_id)
            .with_created(created)
            .with_covered_components(["@authority", "@method", "@path"]);
        options.signature_agent = agent.clone();

        let signature = signer.sign(&mut request, &options).unwrap();

        prop_assert!(signature.signature_input.contains("\"@authority\""));
        prop_assert_eq!(
            agent.is_some(),
            signature.signature_input.contains("\"signature-agent\"")
        );
        prop_assert_eq!(
            reconstruct_signature_base(&request, "sig1").unwrap(),
            signature.signature_base
        );

        let result = MessageVerifier::new().verify(&request, "sig1", &verifying_key);
        prop_assert!(result.is_ok(), "Verification failed: {:?}", result.err());
    }

    #[test]
    fn test_key_identifier_is_deterministic(seed in any::<[u8; 32]>()) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        let from_public = public_identifier(&verifying_key);
        prop_assert_eq!(&from_public, &public_identifier(&verifying_key));
        prop_assert_eq!(&from_public, &Jwk::from_signing_key(&signing_key).thumbprint());
        prop_assert_eq!(from_public.len(), 43);
    }

    #[test]
    fn test_tampered_authority_fails(
        seed in any::<[u8; 32]>(),
        authority in "[a-z]{1,10}\\.com",
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        let mut resolver = InMemoryKeyResolver::new();
        let key_id = resolver.add(signing_key);
        let signer = MessageSigner::new(Arc::new(resolver));

        let mut request = Request::new(Method::GET, format!("https://{authority}/").parse().unwrap());
        signer.sign(&mut request, &SignOptions::new(key_id)).unwrap();

        let mut tampered = Request::new(Method::GET, format!("https://x{authority}/").parse().unwrap());
        *tampered.headers_mut() = request.headers().clone();

        prop_assert!(MessageVerifier::new().verify(&tampered, "sig1", &verifying_key).is_err());
    }
}
