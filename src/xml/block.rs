//! Encoding of one buffer of entities into an XML fragment.

use std::fmt::Write;

use crate::data::osm::{Changeset, ChangesetComment, Entity, Node, ObjectMeta, Relation, Tag, Way};
use crate::data::Buffer;

use super::escape::append_xml_encoded;
use super::format::append_coordinate;
use super::options::XmlOutputOptions;

/// Change operation of an object in .osc files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    None,
    Create,
    Modify,
    Delete,
}

impl Operation {
    fn of(meta: &ObjectMeta) -> Self {
        if !meta.visible {
            Operation::Delete
        } else if meta.version <= 1 {
            Operation::Create
        } else {
            Operation::Modify
        }
    }

    fn tag_name(self) -> Option<&'static str> {
        match self {
            Operation::None => None,
            Operation::Create => Some("create"),
            Operation::Modify => Some("modify"),
            Operation::Delete => Some("delete"),
        }
    }
}

struct BlockEncoder<'a> {
    options: &'a XmlOutputOptions,
    out: String,
    last_op: Operation,
}

impl<'a> BlockEncoder<'a> {
    fn new(options: &'a XmlOutputOptions) -> Self {
        BlockEncoder {
            options,
            out: String::new(),
            last_op: Operation::None,
        }
    }

    fn finish(mut self) -> String {
        if self.options.use_change_ops {
            self.open_close_op_tag(Operation::None);
        }
        self.out
    }

    fn write_spaces(&mut self, num: usize) {
        self.out.extend(std::iter::repeat(' ').take(num));
    }

    fn write_prefix(&mut self) {
        self.write_spaces(self.options.prefix_spaces());
    }

    fn write_meta(&mut self, meta: &ObjectMeta) {
        let _ = write!(self.out, " id=\"{}\"", meta.id);

        if !self.options.add_metadata {
            return;
        }

        if meta.version != 0 {
            let _ = write!(self.out, " version=\"{}\"", meta.version);
        }

        if meta.timestamp.is_set() {
            self.out.push_str(" timestamp=\"");
            self.out.push_str(&meta.timestamp.to_iso());
            self.out.push('"');
        }

        if !meta.user_is_anonymous() {
            let _ = write!(self.out, " uid=\"{}\" user=\"", meta.uid);
            append_xml_encoded(&mut self.out, &meta.user);
            self.out.push('"');
        }

        if meta.changeset != 0 {
            let _ = write!(self.out, " changeset=\"{}\"", meta.changeset);
        }

        if self.options.add_visible_flag {
            if meta.visible {
                self.out.push_str(" visible=\"true\"");
            } else {
                self.out.push_str(" visible=\"false\"");
            }
        }
    }

    fn write_tags(&mut self, tags: &[Tag], spaces: usize) {
        for tag in tags {
            self.write_spaces(spaces);
            self.out.push_str("  <tag k=\"");
            append_xml_encoded(&mut self.out, &tag.key);
            self.out.push_str("\" v=\"");
            append_xml_encoded(&mut self.out, &tag.value);
            self.out.push_str("\"/>\n");
        }
    }

    fn write_discussion(&mut self, comments: &[ChangesetComment]) {
        self.out.push_str("  <discussion>\n");
        for comment in comments {
            let _ = write!(self.out, "   <comment uid=\"{}\" user=\"", comment.uid);
            append_xml_encoded(&mut self.out, &comment.user);
            self.out.push_str("\" date=\"");
            self.out.push_str(&comment.date.to_iso());
            self.out.push_str("\">\n    <text>");
            append_xml_encoded(&mut self.out, &comment.text);
            self.out.push_str("</text>\n   </comment>\n");
        }
        self.out.push_str("  </discussion>\n");
    }

    /// Closes the open wrapper and opens the one for `op`, unless `op` is
    /// already open.
    fn open_close_op_tag(&mut self, op: Operation) {
        if op == self.last_op {
            return;
        }
        if let Some(name) = self.last_op.tag_name() {
            let _ = writeln!(self.out, "  </{name}>");
        }
        if let Some(name) = op.tag_name() {
            let _ = writeln!(self.out, "  <{name}>");
        }
        self.last_op = op;
    }

    fn start_object(&mut self, element: &str, meta: &ObjectMeta) {
        if self.options.use_change_ops {
            self.open_close_op_tag(Operation::of(meta));
        }
        self.write_prefix();
        self.out.push('<');
        self.out.push_str(element);
        self.write_meta(meta);
    }

    fn end_object(&mut self, element: &str, tags: &[Tag]) {
        self.write_tags(tags, self.options.prefix_spaces());
        self.write_prefix();
        let _ = writeln!(self.out, "</{element}>");
    }

    fn entity(&mut self, entity: &Entity) {
        match entity {
            Entity::Node(node) => self.node(node),
            Entity::Way(way) => self.way(way),
            Entity::Relation(relation) => self.relation(relation),
            Entity::Changeset(changeset) => self.changeset(changeset),
        }
    }

    fn node(&mut self, node: &Node) {
        self.start_object("node", &node.meta);

        if let Some(location) = node.location {
            self.out.push_str(" lat=\"");
            append_coordinate(&mut self.out, location.y);
            self.out.push_str("\" lon=\"");
            append_coordinate(&mut self.out, location.x);
            self.out.push('"');
        }

        if node.tags.is_empty() {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");
        self.end_object("node", &node.tags);
    }

    fn way(&mut self, way: &Way) {
        self.start_object("way", &way.meta);

        if way.tags.is_empty() && way.nodes.is_empty() {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");

        for node_ref in &way.nodes {
            self.write_prefix();
            let _ = writeln!(self.out, "  <nd ref=\"{node_ref}\"/>");
        }
        self.end_object("way", &way.tags);
    }

    fn relation(&mut self, relation: &Relation) {
        self.start_object("relation", &relation.meta);

        if relation.tags.is_empty() && relation.members.is_empty() {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");

        for member in &relation.members {
            self.write_prefix();
            let _ = write!(
                self.out,
                "  <member type=\"{}\" ref=\"{}\" role=\"",
                member.item_type.name(),
                member.member_ref
            );
            append_xml_encoded(&mut self.out, &member.role);
            self.out.push_str("\"/>\n");
        }
        self.end_object("relation", &relation.tags);
    }

    // Changesets never take part in change operations and use a fixed indent.
    fn changeset(&mut self, changeset: &Changeset) {
        let _ = write!(self.out, " <changeset id=\"{}\"", changeset.id);

        if changeset.created_at.is_set() {
            self.out.push_str(" created_at=\"");
            self.out.push_str(&changeset.created_at.to_iso());
            self.out.push('"');
        }

        if changeset.closed_at.is_set() {
            self.out.push_str(" closed_at=\"");
            self.out.push_str(&changeset.closed_at.to_iso());
            self.out.push_str("\" open=\"false\"");
        } else {
            self.out.push_str(" open=\"true\"");
        }

        if !changeset.user_is_anonymous() {
            self.out.push_str(" user=\"");
            append_xml_encoded(&mut self.out, &changeset.user);
            let _ = write!(self.out, "\" uid=\"{}\"", changeset.uid);
        }

        if let Some(bounds) = changeset.bounds {
            for (name, units) in [
                ("min_lat", bounds.bottom_left.y),
                ("min_lon", bounds.bottom_left.x),
                ("max_lat", bounds.top_right.y),
                ("max_lon", bounds.top_right.x),
            ] {
                let _ = write!(self.out, " {name}=\"");
                append_coordinate(&mut self.out, units);
                self.out.push('"');
            }
        }

        let _ = write!(
            self.out,
            " num_changes=\"{}\" comments_count=\"{}\"",
            changeset.num_changes, changeset.num_comments
        );

        if changeset.tags.is_empty() && changeset.num_comments == 0 {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");

        self.write_tags(&changeset.tags, 0);

        if changeset.num_comments > 0 {
            self.write_discussion(&changeset.discussion);
        }

        self.out.push_str(" </changeset>\n");
    }
}

/// Encodes every entity of `buffer` in order.
///
/// Each call starts with no change operation open and closes whatever it
/// opened, so the fragments of separate calls can simply be concatenated.
pub fn encode_buffer(buffer: &Buffer, options: &XmlOutputOptions) -> String {
    let mut encoder = BlockEncoder::new(options);
    for entity in buffer {
        encoder.entity(entity);
    }
    encoder.finish()
}

/// Unit of work handed to the worker pool: one buffer plus the session options.
pub struct XmlOutputBlock {
    buffer: Buffer,
    options: XmlOutputOptions,
}

impl XmlOutputBlock {
    pub fn new(buffer: Buffer, options: XmlOutputOptions) -> Self {
        XmlOutputBlock { buffer, options }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Consumes the block, it can only run once.
    pub fn run(self) -> String {
        encode_buffer(&self.buffer, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{Bounds, ItemType, Location, Member, Timestamp};

    const PLAIN: XmlOutputOptions = XmlOutputOptions {
        add_metadata: false,
        add_visible_flag: false,
        use_change_ops: false,
    };

    const METADATA: XmlOutputOptions = XmlOutputOptions {
        add_metadata: true,
        add_visible_flag: false,
        use_change_ops: false,
    };

    const CHANGE: XmlOutputOptions = XmlOutputOptions {
        add_metadata: true,
        add_visible_flag: false,
        use_change_ops: true,
    };

    fn node(id: i64) -> Node {
        Node {
            meta: ObjectMeta::new(id),
            location: None,
            tags: Vec::new(),
        }
    }

    fn versioned_node(id: i64, version: u32, visible: bool) -> Entity {
        let mut node = node(id);
        node.meta.version = version;
        node.meta.visible = visible;
        node.into()
    }

    fn encode(entities: Vec<Entity>, options: &XmlOutputOptions) -> String {
        encode_buffer(&Buffer::from(entities), options)
    }

    #[test]
    fn bare_node_is_self_closed() {
        assert_eq!(encode(vec![node(1).into()], &PLAIN), "  <node id=\"1\"/>\n");
    }

    #[test]
    fn one_tag_forces_open_and_close() {
        let mut tagged = node(1);
        tagged.location = Some(Location::from_units(-1_278_000, 515_073_509));
        tagged.tags.push(Tag::new("name", "Trafalgar \"Square\""));
        assert_eq!(
            encode(vec![tagged.into()], &PLAIN),
            "  <node id=\"1\" lat=\"51.5073509\" lon=\"-0.1278000\">\n\
             \x20   <tag k=\"name\" v=\"Trafalgar &quot;Square&quot;\"/>\n\
             \x20 </node>\n"
        );
    }

    #[test]
    fn metadata_is_written_when_present() {
        let mut meta = ObjectMeta::new(17);
        meta.version = 3;
        meta.timestamp = Timestamp(1_420_070_400);
        meta.uid = 42;
        meta.user = b"m&m".to_vec();
        meta.changeset = 99;
        let entity = Node {
            meta,
            location: None,
            tags: Vec::new(),
        };
        assert_eq!(
            encode(vec![entity.clone().into()], &METADATA),
            "  <node id=\"17\" version=\"3\" timestamp=\"2015-01-01T00:00:00Z\" \
             uid=\"42\" user=\"m&amp;m\" changeset=\"99\"/>\n"
        );
        assert_eq!(encode(vec![entity.into()], &PLAIN), "  <node id=\"17\"/>\n");
    }

    #[test]
    fn anonymous_authors_are_omitted() {
        let mut entity = node(5);
        entity.meta.version = 1;
        entity.meta.user = b"nobody".to_vec();
        assert_eq!(
            encode(vec![entity.into()], &METADATA),
            "  <node id=\"5\" version=\"1\"/>\n"
        );
    }

    #[test]
    fn visible_flag_follows_the_option() {
        let options = XmlOutputOptions {
            add_metadata: true,
            add_visible_flag: true,
            use_change_ops: false,
        };
        assert_eq!(
            encode(vec![versioned_node(1, 2, true), versioned_node(1, 3, false)], &options),
            "  <node id=\"1\" version=\"2\" visible=\"true\"/>\n\
             \x20 <node id=\"1\" version=\"3\" visible=\"false\"/>\n"
        );
    }

    #[test]
    fn way_lists_node_refs_before_tags() {
        let way = Way {
            meta: ObjectMeta::new(10),
            nodes: vec![3, 1, 2],
            tags: vec![Tag::new("highway", "residential")],
        };
        let empty = Way {
            meta: ObjectMeta::new(11),
            nodes: Vec::new(),
            tags: Vec::new(),
        };
        assert_eq!(
            encode(vec![way.into(), empty.into()], &PLAIN),
            "  <way id=\"10\">\n\
             \x20   <nd ref=\"3\"/>\n\
             \x20   <nd ref=\"1\"/>\n\
             \x20   <nd ref=\"2\"/>\n\
             \x20   <tag k=\"highway\" v=\"residential\"/>\n\
             \x20 </way>\n\
             \x20 <way id=\"11\"/>\n"
        );
    }

    #[test]
    fn relation_members_keep_their_order() {
        let relation = Relation {
            meta: ObjectMeta::new(7),
            members: vec![
                Member::new(ItemType::Way, 5, "outer"),
                Member::new(ItemType::Node, 6, "<label>"),
            ],
            tags: vec![Tag::new("type", "multipolygon")],
        };
        assert_eq!(
            encode(vec![relation.into()], &PLAIN),
            "  <relation id=\"7\">\n\
             \x20   <member type=\"way\" ref=\"5\" role=\"outer\"/>\n\
             \x20   <member type=\"node\" ref=\"6\" role=\"&lt;label&gt;\"/>\n\
             \x20   <tag k=\"type\" v=\"multipolygon\"/>\n\
             \x20 </relation>\n"
        );

        let bare = Relation {
            meta: ObjectMeta::new(8),
            members: Vec::new(),
            tags: Vec::new(),
        };
        assert_eq!(encode(vec![bare.into()], &PLAIN), "  <relation id=\"8\"/>\n");
    }

    #[test]
    fn duplicate_tag_keys_pass_through() {
        let mut entity = node(1);
        entity.tags = vec![Tag::new("a", "1"), Tag::new("a", "2")];
        let out = encode(vec![entity.into()], &PLAIN);
        assert_eq!(out.matches("<tag k=\"a\"").count(), 2);
    }

    #[test]
    fn change_operations_group_contiguous_runs() {
        let entities = vec![
            versioned_node(1, 1, true),
            versioned_node(2, 1, true),
            versioned_node(3, 2, true),
            versioned_node(4, 3, false),
            versioned_node(5, 2, false),
        ];
        assert_eq!(
            encode(entities, &CHANGE),
            "  <create>\n\
             \x20   <node id=\"1\" version=\"1\"/>\n\
             \x20   <node id=\"2\" version=\"1\"/>\n\
             \x20 </create>\n\
             \x20 <modify>\n\
             \x20   <node id=\"3\" version=\"2\"/>\n\
             \x20 </modify>\n\
             \x20 <delete>\n\
             \x20   <node id=\"4\" version=\"3\"/>\n\
             \x20   <node id=\"5\" version=\"2\"/>\n\
             \x20 </delete>\n"
        );
    }

    #[test]
    fn missing_version_counts_as_create() {
        let out = encode(vec![node(1).into()], &CHANGE);
        assert_eq!(out, "  <create>\n    <node id=\"1\"/>\n  </create>\n");
    }

    #[test]
    fn every_block_starts_without_open_operation() {
        let first = encode(vec![versioned_node(1, 2, true)], &CHANGE);
        let second = encode(vec![versioned_node(2, 2, true)], &CHANGE);
        assert!(first.starts_with("  <modify>\n"));
        assert!(second.starts_with("  <modify>\n"));
        assert!(first.ends_with("  </modify>\n"));
    }

    #[test]
    fn changeset_without_comments_or_tags_is_self_closed() {
        let changeset = Changeset::new(42);
        assert_eq!(
            encode(vec![changeset.into()], &METADATA),
            " <changeset id=\"42\" open=\"true\" num_changes=\"0\" comments_count=\"0\"/>\n"
        );
    }

    #[test]
    fn changeset_with_comment_has_discussion() {
        let mut changeset = Changeset::new(42);
        changeset.created_at = Timestamp(1_420_070_400);
        changeset.closed_at = Timestamp(1_420_074_000);
        changeset.uid = 7;
        changeset.user = b"alice".to_vec();
        changeset.bounds = Some(Bounds::new(
            Location::from_units(-1_000_000, 515_000_000),
            Location::from_units(1_000_000, 516_000_000),
        ));
        changeset.num_changes = 3;
        changeset.num_comments = 1;
        changeset.tags.push(Tag::new("comment", "fix"));
        changeset.discussion.push(ChangesetComment {
            date: Timestamp(1_420_156_800),
            uid: 8,
            user: b"bob".to_vec(),
            text: b"looks good & thanks".to_vec(),
        });

        assert_eq!(
            encode(vec![changeset.into()], &METADATA),
            " <changeset id=\"42\" created_at=\"2015-01-01T00:00:00Z\" \
             closed_at=\"2015-01-01T01:00:00Z\" open=\"false\" user=\"alice\" uid=\"7\" \
             min_lat=\"51.5000000\" min_lon=\"-0.1000000\" max_lat=\"51.6000000\" \
             max_lon=\"0.1000000\" num_changes=\"3\" comments_count=\"1\">\n\
             \x20 <tag k=\"comment\" v=\"fix\"/>\n\
             \x20 <discussion>\n\
             \x20  <comment uid=\"8\" user=\"bob\" date=\"2015-01-02T00:00:00Z\">\n\
             \x20   <text>looks good &amp; thanks</text>\n\
             \x20  </comment>\n\
             \x20 </discussion>\n\
             \x20</changeset>\n"
        );
    }

    #[test]
    fn changeset_bounds_ignore_metadata_option() {
        let mut changeset = Changeset::new(1);
        changeset.bounds = Some(Bounds::new(
            Location::from_units(0, 0),
            Location::from_units(10, 20),
        ));
        let out = encode(vec![changeset.into()], &PLAIN);
        assert!(out.contains(" max_lat=\"0.0000020\" max_lon=\"0.0000010\""));
    }

    #[test]
    fn malformed_strings_are_repaired() {
        let mut entity = node(1);
        entity.tags.push(Tag::new(b"name".to_vec(), b"M\xfcnchen".to_vec()));
        let out = encode(vec![entity.into()], &PLAIN);
        assert!(out.contains("v=\"M\u{FFFD}nchen\""));
    }

    #[test]
    fn block_runs_once_and_matches_direct_encoding() {
        let buffer = Buffer::from(vec![versioned_node(1, 1, true), versioned_node(2, 4, true)]);
        let expected = encode_buffer(&buffer, &CHANGE);
        let block = XmlOutputBlock::new(buffer, CHANGE);
        assert_eq!(block.len(), 2);
        assert_eq!(block.run(), expected);
    }
}
