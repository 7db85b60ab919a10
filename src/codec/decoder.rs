//! Document to native store
//!
//! Decoding runs in two passes over an [`ObjectGraph`] that has already
//! passed its structural checks. Pass one creates every object unlinked:
//! committed datatypes first, retried until each one's dependencies exist,
//! then groups, then datasets. Pass two wires links, writes attributes and
//! values, and restores timestamps, by which point every identifier maps to
//! a native address.

use crate::codec::config::DecoderConfig;
use crate::error::{Hdf5JsonError, Result};
use crate::models::datatype::Datatype;
use crate::models::document::Document;
use crate::models::graph::{Attribute, Dataset, Hdf5Object, ObjectBody, ObjectGraph};
use crate::models::identifier::{Collection, Identifier, ObjectRef};
use crate::models::value::DataValue;
use crate::store::{NativeAttribute, NativeDataset, NativeSink, ObjectAddr};
use std::collections::HashMap;
use tracing::{debug, info};

/// Decodes documents into a native sink
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a document into `sink`, returning the sink once it is flushed
    ///
    /// Every structural check runs before the first native call. On error the
    /// sink is dropped with whatever it holds; callers discard it.
    pub fn decode<S: NativeSink>(&self, doc: &Document, sink: S) -> Result<S> {
        let graph = ObjectGraph::from_document(doc)?;
        self.decode_graph(&graph, sink)
    }

    pub fn decode_str<S: NativeSink>(&self, content: &str, sink: S) -> Result<S> {
        let doc = Document::from_json_str(content)?;
        self.decode(&doc, sink)
    }

    pub fn decode_graph<S: NativeSink>(&self, graph: &ObjectGraph, mut sink: S) -> Result<S> {
        info!(objects = graph.len(), "Decoding document");
        let mut pass = DecodePass {
            graph,
            addrs: HashMap::with_capacity(graph.len()),
        };
        pass.create_objects(&mut sink)?;
        pass.link_objects(&mut sink, &self.config)?;
        sink.flush()?;
        info!(objects = pass.addrs.len(), "Decoded document");
        Ok(sink)
    }
}

struct DecodePass<'a> {
    graph: &'a ObjectGraph,
    addrs: HashMap<Identifier, ObjectAddr>,
}

impl DecodePass<'_> {
    fn addr(&self, id: &Identifier, location: &str) -> Result<ObjectAddr> {
        self.addrs
            .get(id)
            .copied()
            .ok_or_else(|| Hdf5JsonError::unresolved(location, id.to_string()))
    }

    fn native_type(&self, datatype: &Datatype, location: &str) -> Result<Datatype<ObjectAddr>> {
        datatype.try_map_committed(&mut |id: &Identifier| {
            self.addr(id, location)
        })
    }

    fn native_value(&self, value: &DataValue<ObjectRef>, location: &str) -> Result<DataValue<ObjectAddr>> {
        value.try_map_refs(&mut |r: &ObjectRef| self.addr(&r.id, location))
    }

    fn is_created(&self, reference: &ObjectRef) -> bool {
        self.addrs.contains_key(&reference.id)
    }

    /// Pass one: every object, no links
    fn create_objects<S: NativeSink>(&mut self, sink: &mut S) -> Result<()> {
        let graph = self.graph;
        let root = graph
            .get(&graph.root)
            .and_then(Hdf5Object::as_group)
            .ok_or_else(|| Hdf5JsonError::unresolved("/root", graph.root.to_string()))?;
        let root_addr = sink.create_file(&graph.file, &root.properties)?;
        self.addrs.insert(graph.root, root_addr);

        // Committed datatypes until a fixed point; each sweep must create at least one
        let mut pending: Vec<&Hdf5Object> = graph
            .objects()
            .filter(|o| o.collection() == Collection::Datatypes)
            .collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for object in pending {
                let Some(committed) = object.as_datatype() else {
                    continue;
                };
                let ready = committed
                    .datatype
                    .committed_references()
                    .into_iter()
                    .all(|id| self.addrs.contains_key(id));
                if !ready {
                    deferred.push(object);
                    continue;
                }
                let location = format!("/datatypes/{}/type", object.id);
                let native = self.native_type(&committed.datatype, &location)?;
                let addr = sink.commit_datatype(&native)?;
                debug!(id = %object.id, addr = %addr, "Committed datatype");
                self.addrs.insert(object.id, addr);
            }
            if deferred.len() == before {
                return Err(Hdf5JsonError::UnresolvedDatatypeReference(
                    deferred.iter().map(|o| o.id).collect(),
                ));
            }
            pending = deferred;
        }

        for object in graph.objects() {
            if object.id == graph.root {
                continue;
            }
            if let Some(group) = object.as_group() {
                let addr = sink.create_group(&group.properties)?;
                debug!(id = %object.id, addr = %addr, "Created group");
                self.addrs.insert(object.id, addr);
            }
        }

        // A fill value may reference another dataset, so datasets settle the same way
        let mut pending: Vec<(&Hdf5Object, &Dataset)> = graph
            .objects()
            .filter_map(|o| o.as_dataset().map(|d| (o, d)))
            .collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            let mut blocked_on = None;
            for (object, dataset) in pending {
                let blocked = dataset.fill_value.as_ref().and_then(|fill| {
                    fill.try_map_refs(&mut |r: &ObjectRef| {
                        if self.is_created(r) { Ok(()) } else { Err(r.to_string()) }
                    })
                    .err()
                });
                if let Some(reference) = blocked {
                    blocked_on.get_or_insert((object.id, reference));
                    deferred.push((object, dataset));
                    continue;
                }
                let location = format!("/datasets/{}", object.id);
                let native = NativeDataset {
                    datatype: self.native_type(&dataset.datatype, &format!("{}/type", location))?,
                    dataspace: dataset.shape.clone(),
                    properties: dataset.properties.clone(),
                    fill_value: dataset
                        .fill_value
                        .as_ref()
                        .map(|v| {
                            self.native_value(v, &format!("{}/creationProperties/fillValue", location))
                        })
                        .transpose()?,
                };
                let addr = sink.create_dataset(&native)?;
                debug!(id = %object.id, addr = %addr, "Created dataset");
                self.addrs.insert(object.id, addr);
            }
            if deferred.len() == before
                && let Some((id, reference)) = blocked_on
            {
                return Err(Hdf5JsonError::unresolved(
                    format!("/datasets/{}/creationProperties/fillValue", id),
                    reference,
                ));
            }
            pending = deferred;
        }
        Ok(())
    }

    /// Pass two: links, attributes, values, timestamps
    fn link_objects<S: NativeSink>(&self, sink: &mut S, config: &DecoderConfig) -> Result<()> {
        for object in self.graph.objects() {
            let addr = self.addr(&object.id, &format!("/{}/{}", object.collection(), object.id))?;
            let location = format!("/{}/{}", object.collection(), object.id);

            if let ObjectBody::Group(group) = &object.body {
                for (i, link) in group.links.iter().enumerate() {
                    let link_location = format!("{}/links/{}", location, i);
                    let native = link.try_map_target(|_, id| self.addr(id, &link_location))?;
                    sink.create_link(addr, &native)?;
                }
            }

            for (i, attribute) in object.attributes.iter().enumerate() {
                let native = self.native_attribute(
                    attribute,
                    config.write_values,
                    &format!("{}/attributes/{}", location, i),
                )?;
                sink.write_attribute(addr, &native)?;
            }

            if config.write_values
                && let ObjectBody::Dataset(dataset) = &object.body
                && let Some(value) = &dataset.value
            {
                let native = self.native_value(value, &format!("{}/value", location))?;
                sink.write_dataset_value(addr, &native)?;
            }

            if config.apply_timestamps
                && (object.timestamps.created.is_some() || object.timestamps.modified.is_some())
            {
                sink.set_timestamps(addr, &object.timestamps)?;
            }
            if config.record_identifiers {
                sink.record_identifier(addr, object.id)?;
            }
        }
        Ok(())
    }

    fn native_attribute(
        &self,
        attribute: &Attribute,
        write_values: bool,
        location: &str,
    ) -> Result<NativeAttribute> {
        let value = match &attribute.value {
            Some(v) if write_values => Some(self.native_value(v, &format!("{}/value", location))?),
            _ => None,
        };
        Ok(NativeAttribute {
            name: attribute.name.clone(),
            datatype: self.native_type(&attribute.datatype, &format!("{}/type", location))?,
            dataspace: attribute.shape.clone(),
            value,
            properties: attribute.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NativeSource};
    use serde_json::json;

    const ROOT: &str = "00000000-0000-4000-8000-000000000001";

    #[test]
    fn test_decode_empty_file() {
        let doc = Document::from_value(json!({
            "apiVersion": "1.1.1",
            "root": ROOT,
            "groups": {ROOT: {"alias": ["/"]}}
        }))
        .unwrap();
        let store = Decoder::default().decode(&doc, MemoryStore::new()).unwrap();
        assert_eq!(store.len(), 1);
        let root = store.root().unwrap();
        assert_eq!(
            store.persistent_identifier(root).unwrap(),
            Some(ROOT.parse().unwrap())
        );
    }

    #[test]
    fn test_structural_error_before_store_calls() {
        let doc = Document::from_value(json!({
            "apiVersion": "1.1.1",
            "root": ROOT,
            "groups": {ROOT: {"links": [{"class": "H5L_TYPE_HARD", "title": "x", "collection": "groups", "id": "00000000-0000-4000-8000-0000000000aa"}]}}
        }))
        .unwrap();
        let result = Decoder::default().decode(&doc, MemoryStore::new());
        assert!(matches!(
            result,
            Err(Hdf5JsonError::UnresolvedIdentifierReference { .. })
        ));
    }

    #[test]
    fn test_identifiers_not_recorded_when_disabled() {
        let doc = Document::from_value(json!({
            "apiVersion": "1.1.1",
            "root": ROOT,
            "groups": {ROOT: {}}
        }))
        .unwrap();
        let decoder = Decoder::new(DecoderConfig::default().with_record_identifiers(false));
        let store = decoder.decode(&doc, MemoryStore::new()).unwrap();
        let root = store.root().unwrap();
        assert_eq!(store.persistent_identifier(root).unwrap(), None);
    }
}
