use crate::{AdError, Result};

/// `key mod len(nodes)`, no virtual nodes: resizing moves almost every key.
#[derive(Debug, Clone)]
pub struct ShardRouter<H> {
    nodes: Vec<H>,
}

impl<H> ShardRouter<H> {
    pub fn new(nodes: Vec<H>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(AdError::Config(
                "shard router needs at least one node".to_string(),
            ));
        }

        Ok(Self { nodes })
    }

    /// Index of the node owning `key`.
    pub fn shard_for(&self, key: u64) -> usize {
        (key % self.nodes.len() as u64) as usize
    }

    pub fn node(&self, key: u64) -> &H {
        &self.nodes[self.shard_for(key)]
    }

    pub fn nodes(&self) -> &[H] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_router_rejected() {
        let result = ShardRouter::<u8>::new(Vec::new());
        assert!(matches!(result, Err(AdError::Config(_))));
    }

    #[test]
    fn test_platforms_spread_over_three_nodes() {
        let router = ShardRouter::new(vec!["n0", "n1", "n2"]).unwrap();

        assert_eq!(router.shard_for(1), 1);
        assert_eq!(router.shard_for(2), 2);
        assert_eq!(router.shard_for(3), 0);
        assert_eq!(*router.node(3), "n0");
        assert_eq!(router.nodes().len(), 3);
    }

    #[test]
    fn test_single_node_owns_everything() {
        let router = ShardRouter::new(vec![()]).unwrap();
        for key in [0, 1, 42, u64::MAX] {
            assert_eq!(router.shard_for(key), 0);
        }
    }

    proptest! {
        #[test]
        fn shard_choice_is_stable(nodes in 1usize..64, key in any::<u64>()) {
            let router = ShardRouter::new((0..nodes).collect::<Vec<_>>()).unwrap();
            let first = router.shard_for(key);

            prop_assert!(first < nodes);
            prop_assert_eq!(first, router.shard_for(key));
            prop_assert_eq!(*router.node(key), first);
        }
    }
}
