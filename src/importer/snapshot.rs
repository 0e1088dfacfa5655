// ==========================================
// 商品目录批量导入系统 - 快照编码与内容寻址
// ==========================================
// 职责: 快照文档规范化排序 → 规范字节串 →
//       SHA-256 摘要（十六进制小写）
// 红线: 相同输入必须产出相同字节串与摘要；
//       文档内禁止时间戳 / 随机 ID
// ==========================================

use crate::domain::import::{Candidate, NormalizationNote, SnapshotDocument};
use crate::importer::error::{ImportError, ImportResult};
use sha2::{Digest, Sha256};

/// 编码完成的快照（字节串 + 摘要一次算定）
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub document: String,
    pub digest: String,
}

/// 规范化排序后编码快照文档
///
/// 排序规则:
/// - source_files: 字典序
/// - products / variants: 行号升序
/// - candidates: (kind, parent_scope, slug) 升序
/// - notes: (行号, 列名) 升序
pub fn encode_snapshot(mut doc: SnapshotDocument) -> ImportResult<EncodedSnapshot> {
    canonicalize(&mut doc);

    let document = serde_json::to_string(&doc)
        .map_err(|e| ImportError::SnapshotEncodeError(e.to_string()))?;
    let digest = sha256_hex(document.as_bytes());

    Ok(EncodedSnapshot { document, digest })
}

/// 解码快照并复核摘要
///
/// 摘要不一致说明快照在存储中被改动，必须拒绝提交
pub fn decode_snapshot(
    job_id: &str,
    document: &str,
    expected_digest: &str,
) -> ImportResult<SnapshotDocument> {
    let actual = sha256_hex(document.as_bytes());
    if actual != expected_digest {
        return Err(ImportError::SnapshotDigestMismatch {
            job_id: job_id.to_string(),
            expected: expected_digest.to_string(),
            actual,
        });
    }

    let doc: SnapshotDocument = serde_json::from_str(document)
        .map_err(|e| ImportError::SnapshotEncodeError(e.to_string()))?;
    Ok(doc)
}

fn canonicalize(doc: &mut SnapshotDocument) {
    doc.source_files.sort();
    doc.products.sort_by_key(|p| p.row_number);
    doc.variants.sort_by_key(|v| v.row_number);
    doc.candidates.sort_by(candidate_order);
    doc.notes.sort_by(note_order);
    for candidate in &mut doc.candidates {
        candidate.rows.sort_unstable();
        candidate.rows.dedup();
    }
}

fn candidate_order(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    (a.kind.as_str(), a.parent_scope.as_deref(), a.slug.as_str()).cmp(&(
        b.kind.as_str(),
        b.parent_scope.as_deref(),
        b.slug.as_str(),
    ))
}

fn note_order(a: &NormalizationNote, b: &NormalizationNote) -> std::cmp::Ordering {
    (a.row, a.column.as_str()).cmp(&(b.row, b.column.as_str()))
}

/// SHA-256 摘要（十六进制小写）
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut hex = String::with_capacity(out.len() * 2);
    for byte in out {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ProductRow, VariantRow};
    use crate::domain::import::CONTRACT_VERSION;
    use crate::domain::types::EntityKind;
    use std::collections::BTreeMap;

    fn product_row(row_number: usize, slug: &str) -> ProductRow {
        ProductRow {
            row_number,
            slug: slug.to_string(),
            name: slug.to_string(),
            title: slug.to_string(),
            title_secondary: None,
            brand_slug: None,
            category_chain: vec!["electronics".to_string()],
            series_slug: "premium".to_string(),
            status: "active".to_string(),
            featured: false,
            description: None,
            features: vec![],
        }
    }

    fn variant_row(row_number: usize, code: &str) -> VariantRow {
        VariantRow {
            row_number,
            product_slug: "p1".to_string(),
            code: code.to_string(),
            original_code: None,
            name: None,
            name_secondary: None,
            sku: None,
            dimensions: None,
            weight: None,
            price: None,
            stock_qty: None,
            specs: BTreeMap::new(),
        }
    }

    fn sample_doc(shuffled: bool) -> SnapshotDocument {
        let mut products = vec![product_row(1, "a"), product_row(2, "b")];
        let mut variants = vec![variant_row(3, "X1"), variant_row(4, "X2")];
        let mut candidates = vec![
            Candidate {
                kind: EntityKind::Brand,
                slug: "acme".to_string(),
                name: "Acme".to_string(),
                parent_scope: None,
                rows: vec![1, 2],
            },
            Candidate {
                kind: EntityKind::Series,
                slug: "premium".to_string(),
                name: "Premium".to_string(),
                parent_scope: Some("electronics".to_string()),
                rows: vec![2, 1],
            },
        ];
        if shuffled {
            products.reverse();
            variants.reverse();
            candidates.reverse();
        }
        SnapshotDocument {
            contract_version: CONTRACT_VERSION,
            source_files: vec!["products.csv".to_string(), "variants.csv".to_string()],
            products,
            variants,
            candidates,
            notes: vec![],
        }
    }

    #[test]
    fn test_encode_deterministic_under_input_order() {
        // 输入顺序不同，规范化后字节串与摘要一致
        let a = encode_snapshot(sample_doc(false)).unwrap();
        let b = encode_snapshot(sample_doc(true)).unwrap();
        assert_eq!(a.document, b.document);
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_decode_roundtrip_with_digest() {
        let encoded = encode_snapshot(sample_doc(false)).unwrap();
        let doc = decode_snapshot("job-1", &encoded.document, &encoded.digest).unwrap();
        assert_eq!(doc.products.len(), 2);
        assert_eq!(doc.candidates[0].rows, vec![1, 2]);
    }

    #[test]
    fn test_decode_rejects_tampered_document() {
        let encoded = encode_snapshot(sample_doc(false)).unwrap();
        let tampered = encoded.document.replace("acme", "evil");
        let err = decode_snapshot("job-1", &tampered, &encoded.digest).unwrap_err();
        assert!(matches!(err, ImportError::SnapshotDigestMismatch { .. }));
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
