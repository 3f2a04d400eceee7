use mailroom::email::{
    AttachmentDescriptor, EmailConfig, EmailError, EmailMessage, EmailProviderConfig,
    create_provider, normalize,
};
use std::sync::Arc;

fn null_config() -> EmailConfig {
    EmailConfig {
        from_address: "noreply@example.com".to_string(),
        from_name: Some("Test App".to_string()),
        reply_to: Some("support@example.com".to_string()),
        provider: EmailProviderConfig::Null,
    }
}

#[tokio::test]
async fn test_null_provider_integration() {
    let email_config = null_config();
    let provider = create_provider(&email_config).unwrap();

    let message = EmailMessage::new(
        "user@example.com",
        email_config.format_from(),
        "Test Email from Null Provider",
    )
    .with_text("This is a test email that will only be logged.")
    .with_reply_to(email_config.reply_to.clone());

    let receipt = provider.send_email(message).await.unwrap();
    assert!(receipt.message_id.ends_with("@example.com>"));
    assert!(provider.verify().await.is_ok());
}

#[tokio::test]
async fn test_null_provider_loads_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, b"%PDF-1.4 test").unwrap();

    let provider = create_provider(&null_config()).unwrap();
    let attachments = normalize(&[
        AttachmentDescriptor::PathRef(path.display().to_string()),
        AttachmentDescriptor::InlineContent {
            filename: Some("notes.txt".to_string()),
            content: "aGVsbG8gd29ybGQ=".to_string(),
            encoding: None,
            content_type: Some("text/plain".to_string()),
        },
    ]);

    let message = EmailMessage::new("user@example.com", "noreply@example.com", "Invoice")
        .with_both("See attached", "<p>See attached</p>")
        .with_attachments(Arc::from(attachments));

    assert!(provider.send_email(message).await.is_ok());
}

#[tokio::test]
async fn test_null_provider_reports_missing_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.pdf");

    let provider = create_provider(&null_config()).unwrap();
    let attachments = normalize(&[AttachmentDescriptor::PathRef(
        missing.display().to_string(),
    )]);
    let message = EmailMessage::new("user@example.com", "noreply@example.com", "Invoice")
        .with_text("See attached")
        .with_attachments(Arc::from(attachments));

    let err = provider.send_email(message).await.unwrap_err();
    assert!(matches!(err, EmailError::AttachmentRead { .. }));
    assert!(err.transport_kind().is_none());
}

#[tokio::test]
async fn test_null_provider_rejects_bad_base64() {
    let provider = create_provider(&null_config()).unwrap();
    let attachments = normalize(&[AttachmentDescriptor::InlineContent {
        filename: Some("broken.bin".to_string()),
        content: "not base64!!".to_string(),
        encoding: Some("base64".to_string()),
        content_type: None,
    }]);
    let message = EmailMessage::new("user@example.com", "noreply@example.com", "Broken")
        .with_text("See attached")
        .with_attachments(Arc::from(attachments));

    let err = provider.send_email(message).await.unwrap_err();
    assert!(matches!(err, EmailError::InvalidAttachment { ref filename, .. } if filename == "broken.bin"));
}
