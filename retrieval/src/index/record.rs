//! rkyv records for persisting indexes and chunk lists.

use crate::error::{Result, RetrievalError};

use super::ivf::InvertedList;
use super::{AnyIndex, FlatIndex, IvfIndex, VectorIndex};

/// Serialized form of an [`AnyIndex`].
#[derive(Debug, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) enum IndexRecord {
    Flat {
        dim: u32,
        data: Vec<f32>,
    },
    Ivf {
        dim: u32,
        nprobe: u32,
        centroids: Vec<f32>,
        lists: Vec<ListRecord>,
    },
}

/// Serialized inverted list.
#[derive(Debug, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) struct ListRecord {
    ids: Vec<u32>,
    data: Vec<f32>,
}

/// Serialized chunk list.
#[derive(Debug, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(crate) struct ChunksRecord {
    pub(crate) chunks: Vec<String>,
}

fn narrow(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RetrievalError::Serialization(format!("{what} {value} does not fit in u32")))
}

impl TryFrom<&AnyIndex> for IndexRecord {
    type Error = RetrievalError;

    fn try_from(index: &AnyIndex) -> Result<Self> {
        match index {
            AnyIndex::Flat(flat) => Ok(Self::Flat {
                dim: narrow(flat.dim(), "dimension")?,
                data: flat.data().to_vec(),
            }),
            AnyIndex::Ivf(ivf) => {
                let lists = ivf
                    .lists()
                    .iter()
                    .map(|list| {
                        Ok(ListRecord {
                            ids: list
                                .ids
                                .iter()
                                .map(|&id| narrow(id, "vector id"))
                                .collect::<Result<_>>()?,
                            data: list.data.clone(),
                        })
                    })
                    .collect::<Result<_>>()?;
                Ok(Self::Ivf {
                    dim: narrow(ivf.dim(), "dimension")?,
                    nprobe: narrow(ivf.nprobe(), "nprobe")?,
                    centroids: ivf.centroids().to_vec(),
                    lists,
                })
            }
        }
    }
}

impl TryFrom<IndexRecord> for AnyIndex {
    type Error = RetrievalError;

    fn try_from(record: IndexRecord) -> Result<Self> {
        match record {
            IndexRecord::Flat { dim, data } => {
                Ok(FlatIndex::from_parts(dim as usize, data)?.into())
            }
            IndexRecord::Ivf {
                dim,
                nprobe,
                centroids,
                lists,
            } => {
                let lists = lists
                    .into_iter()
                    .map(|list| InvertedList {
                        ids: list.ids.into_iter().map(|id| id as usize).collect(),
                        data: list.data,
                    })
                    .collect();
                Ok(IvfIndex::from_parts(dim as usize, nprobe as usize, centroids, lists)?.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rkyv::rancor::Error as RkyvError;

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn ivf_survives_serialization() {
        let data = Array2::from_shape_fn((40, 3), |(r, c)| ((r * 7 + c) % 11) as f32);
        let mut ivf = IvfIndex::new(3, 4, 2);
        ivf.train(&data, 5).unwrap();
        ivf.add(&data).unwrap();
        let index = AnyIndex::from(ivf);

        let bytes = rkyv::to_bytes::<RkyvError>(&IndexRecord::try_from(&index).unwrap()).unwrap();
        let record = rkyv::from_bytes::<IndexRecord, RkyvError>(&bytes).unwrap();
        let restored = AnyIndex::try_from(record).unwrap();

        assert_eq!(restored, index);
        assert_eq!(restored.len(), 40);
    }
}
