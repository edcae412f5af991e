fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use filedeck_protocol::{
        ApiResponse, BatchDeleteRequest, BatchDeleteResponse, CompleteUploadRequest,
        DeleteRequest, FileListing, FileQuery, InitUploadRequest, InitUploadResponse,
        ObjectDescriptor, PartReceipt, RenameRequest, RenameTarget, TreeListing, TreeQuery,
        UploadMode, UploadPartRequest,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values (key order independent). Returns the parsed value.
    fn roundtrip<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  ours: {reserialized}"
        );
        parsed
    }

    // --- Upload session ---

    #[test]
    fn fixture_init_upload_request() {
        let req: InitUploadRequest = roundtrip("init_upload_request.json");
        assert_eq!(req.filesize, 15_728_640);
    }

    #[test]
    fn fixture_init_upload_response_chunked() {
        let resp: InitUploadResponse = roundtrip("init_upload_response_chunked.json");
        assert_eq!(resp.mode, UploadMode::Chunked);
        assert_eq!(resp.total_parts, Some(3));
    }

    #[test]
    fn fixture_init_upload_response_direct() {
        let resp: InitUploadResponse = roundtrip("init_upload_response_direct.json");
        assert_eq!(resp.mode, UploadMode::Direct);
        assert!(resp.upload_id.is_none());
        assert!(resp.part_size.is_none());
    }

    #[test]
    fn fixture_upload_part_request() {
        let req: UploadPartRequest = roundtrip("upload_part_request.json");
        assert_eq!(req.part_number, 2);
        assert_eq!(req.checksum.len(), 64);
    }

    #[test]
    fn fixture_part_receipt() {
        roundtrip::<PartReceipt>("part_receipt.json");
    }

    #[test]
    fn fixture_complete_upload_request() {
        let req: CompleteUploadRequest = roundtrip("complete_upload_request.json");
        let numbers: Vec<u32> = req.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn fixture_object_descriptor() {
        let obj: ObjectDescriptor = roundtrip("object_descriptor.json");
        assert_eq!(obj.id, Some(1042));
    }

    // --- Browsing ---

    #[test]
    fn fixture_tree_query() {
        let q: TreeQuery = roundtrip("tree_query.json");
        assert_eq!(q.scope, "42");
    }

    #[test]
    fn fixture_tree_listing_envelope() {
        let resp: ApiResponse<TreeListing> = roundtrip("tree_listing_envelope.json");
        let listing = resp.into_data("tree").unwrap();
        let node = listing.node.unwrap();
        assert_eq!(node.stats.file_count, 12);
        assert_eq!(node.breadcrumbs.unwrap().len(), 2);
        assert_eq!(listing.children[1].full_path, "contracts/2024");
        assert!(listing.children[1].has_children);
    }

    #[test]
    fn fixture_file_query() {
        let q: FileQuery = roundtrip("file_query.json");
        assert!(q.include_children);
        assert_eq!(q.page, 2);
    }

    #[test]
    fn fixture_file_listing_envelope() {
        let resp: ApiResponse<FileListing> = roundtrip("file_listing_envelope.json");
        let listing = resp.into_data("file listing").unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.pagination.total, 12);
        assert!(listing.items[1].mime_type.is_none());
    }

    #[test]
    fn fixture_failure_envelope() {
        let resp: ApiResponse<FileListing> = roundtrip("failure_envelope.json");
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded for customer");
    }

    // --- Mutations ---

    #[test]
    fn fixture_delete_request() {
        roundtrip::<DeleteRequest>("delete_request.json");
    }

    #[test]
    fn fixture_batch_delete() {
        let req: BatchDeleteRequest = roundtrip("batch_delete_request.json");
        let resp: BatchDeleteResponse = roundtrip("batch_delete_response.json");
        assert_eq!(req.ids.len() as u64, resp.deleted_count);
    }

    #[test]
    fn fixture_rename_requests() {
        let file: RenameRequest = roundtrip("rename_file_request.json");
        assert_eq!(file.target, RenameTarget::File(1042));

        let folder: RenameRequest = roundtrip("rename_folder_request.json");
        assert_eq!(folder.target, RenameTarget::Folder("contracts/2024".into()));
    }
}
